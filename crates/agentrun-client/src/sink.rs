use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque rendering surface that receives dispatched stream content.
///
/// Implementations own region bookkeeping (a region id names either a
/// keyed markdown container or the streaming-text area); the dispatcher
/// decides *when* regions are created, replaced, or removed.
pub trait OutputTarget: Send {
    /// Removes the "starting" placeholder marker if one is present.
    fn clear_placeholder(&mut self);

    /// Appends raw HTML at the end of the surface.
    fn append_html(&mut self, html: &str);

    /// Appends plain text to the region with the given id, creating the
    /// region at the end of the surface if it does not exist yet.
    fn append_text(&mut self, region_id: &str, text: &str);

    /// Creates or fully replaces the keyed region's rendered contents.
    fn set_region(&mut self, region_id: &str, html: &str);

    /// Removes the keyed region (text or rendered) if present.
    fn remove_region(&mut self, region_id: &str);

    /// Appends a clearly-marked final result block.
    fn append_final_block(&mut self, html: &str);

    /// Appends a clearly-marked error block.
    fn append_error_block(&mut self, message: &str);

    /// Appends a cancellation notice, visually distinct from an error.
    fn append_cancel_notice(&mut self, message: &str);

    /// Scrolls the surface to its end.
    fn scroll_to_end(&mut self);
}

fn lock_shared<T>(target: &Mutex<T>) -> MutexGuard<'_, T> {
    target.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handles render through the inner target, serialized by the
/// mutex. This is the handle shape tests and UI hosts keep while an
/// execution owns the boxed target.
impl<T: OutputTarget> OutputTarget for Arc<Mutex<T>> {
    fn clear_placeholder(&mut self) {
        lock_shared(self).clear_placeholder();
    }

    fn append_html(&mut self, html: &str) {
        lock_shared(self).append_html(html);
    }

    fn append_text(&mut self, region_id: &str, text: &str) {
        lock_shared(self).append_text(region_id, text);
    }

    fn set_region(&mut self, region_id: &str, html: &str) {
        lock_shared(self).set_region(region_id, html);
    }

    fn remove_region(&mut self, region_id: &str) {
        lock_shared(self).remove_region(region_id);
    }

    fn append_final_block(&mut self, html: &str) {
        lock_shared(self).append_final_block(html);
    }

    fn append_error_block(&mut self, message: &str) {
        lock_shared(self).append_error_block(message);
    }

    fn append_cancel_notice(&mut self, message: &str) {
        lock_shared(self).append_cancel_notice(message);
    }

    fn scroll_to_end(&mut self) {
        lock_shared(self).scroll_to_end();
    }
}

/// One rendered block inside a `MemoryTarget`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedBlock {
    /// The "starting" marker shown before the first content arrives.
    Placeholder,
    /// Raw appended HTML.
    Html(String),
    /// The streaming-text region.
    Text { region_id: String, content: String },
    /// A keyed rendered region (last write wins).
    Region { region_id: String, html: String },
    /// The final result block.
    FinalBlock(String),
    /// A rendered error block.
    ErrorBlock(String),
    /// A cancellation notice.
    CancelNotice(String),
}

/// In-memory `OutputTarget` modeling the surface as an ordered block
/// list. Used by tests and by saved-result restoration in headless
/// hosts.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    blocks: Vec<RenderedBlock>,
    scrolls: usize,
}

impl MemoryTarget {
    /// Creates an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a target showing the starting placeholder.
    pub fn with_placeholder() -> Self {
        Self {
            blocks: vec![RenderedBlock::Placeholder],
            scrolls: 0,
        }
    }

    /// Returns the rendered blocks in order.
    pub fn blocks(&self) -> &[RenderedBlock] {
        &self.blocks
    }

    /// Returns the rendered HTML of the keyed region, if present.
    pub fn region_html(&self, region_id: &str) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            RenderedBlock::Region { region_id: id, html } if id == region_id => {
                Some(html.as_str())
            }
            _ => None,
        })
    }

    /// Returns the accumulated content of the keyed text region, if
    /// present.
    pub fn text_content(&self, region_id: &str) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            RenderedBlock::Text {
                region_id: id,
                content,
            } if id == region_id => Some(content.as_str()),
            _ => None,
        })
    }

    /// Returns true while the starting placeholder is still shown.
    pub fn has_placeholder(&self) -> bool {
        self.blocks.contains(&RenderedBlock::Placeholder)
    }

    /// Returns how many times the surface was scrolled to its end.
    pub fn scroll_count(&self) -> usize {
        self.scrolls
    }
}

impl OutputTarget for MemoryTarget {
    fn clear_placeholder(&mut self) {
        self.blocks
            .retain(|block| !matches!(block, RenderedBlock::Placeholder));
    }

    fn append_html(&mut self, html: &str) {
        self.blocks.push(RenderedBlock::Html(html.to_string()));
    }

    fn append_text(&mut self, region_id: &str, text: &str) {
        for block in &mut self.blocks {
            if let RenderedBlock::Text {
                region_id: id,
                content,
            } = block
                && id == region_id
            {
                content.push_str(text);
                return;
            }
        }
        self.blocks.push(RenderedBlock::Text {
            region_id: region_id.to_string(),
            content: text.to_string(),
        });
    }

    fn set_region(&mut self, region_id: &str, html: &str) {
        for block in &mut self.blocks {
            if let RenderedBlock::Region {
                region_id: id,
                html: existing,
            } = block
                && id == region_id
            {
                *existing = html.to_string();
                return;
            }
        }
        self.blocks.push(RenderedBlock::Region {
            region_id: region_id.to_string(),
            html: html.to_string(),
        });
    }

    fn remove_region(&mut self, region_id: &str) {
        self.blocks.retain(|block| match block {
            RenderedBlock::Region { region_id: id, .. }
            | RenderedBlock::Text { region_id: id, .. } => id != region_id,
            _ => true,
        });
    }

    fn append_final_block(&mut self, html: &str) {
        self.blocks.push(RenderedBlock::FinalBlock(html.to_string()));
    }

    fn append_error_block(&mut self, message: &str) {
        self.blocks
            .push(RenderedBlock::ErrorBlock(message.to_string()));
    }

    fn append_cancel_notice(&mut self, message: &str) {
        self.blocks
            .push(RenderedBlock::CancelNotice(message.to_string()));
    }

    fn scroll_to_end(&mut self) {
        self.scrolls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_region_replaces_instead_of_appending() {
        let mut target = MemoryTarget::new();
        target.set_region("md-1", "A");
        target.set_region("md-1", "B");
        assert_eq!(target.region_html("md-1"), Some("B"));
        assert_eq!(target.blocks().len(), 1);
    }

    #[test]
    fn append_text_reuses_the_same_region() {
        let mut target = MemoryTarget::new();
        target.append_text("stream-text", "hel");
        target.append_text("stream-text", "lo");
        assert_eq!(target.text_content("stream-text"), Some("hello"));
        assert_eq!(target.blocks().len(), 1);
    }

    #[test]
    fn remove_region_covers_text_and_rendered_regions() {
        let mut target = MemoryTarget::new();
        target.set_region("md-1", "A");
        target.append_text("stream-text", "x");
        target.remove_region("md-1");
        target.remove_region("stream-text");
        assert!(target.blocks().is_empty());
    }

    #[test]
    fn placeholder_is_cleared_once_present() {
        let mut target = MemoryTarget::with_placeholder();
        assert!(target.has_placeholder());
        target.clear_placeholder();
        assert!(!target.has_placeholder());
    }
}
