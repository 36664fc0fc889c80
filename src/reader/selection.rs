use crate::model::Post;

/// The post currently open in the detail view.
///
/// Holds its own copy of the post, so later changes to the feed never
/// affect what is shown.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    selected: Option<Post>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, post: &Post) {
        self.selected = Some(post.clone());
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Post> {
        self.selected.as_ref()
    }
}
