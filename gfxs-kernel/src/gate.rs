//! Change suppression.

/// Whether a render of `current` is worth issuing.
///
/// Cursor-only activity or an edit-then-undo leaves the document equal to the
/// last rendered text, and the render is skipped unless forced.
pub fn should_render(current: &str, last_rendered: &str, force: bool) -> bool {
    force || current != last_rendered
}
