use crate::event::StreamEvent;
use crate::sink::OutputTarget;

/// Region id for the single lazily-created streaming-text area.
pub const TEXT_REGION_ID: &str = "streaming-text";

/// Applies decoded content events to an output target.
///
/// Tracks the per-execution render state: the placeholder is removed at
/// most once, and all `text_chunk` events share one text region.
/// Terminal events carry no render side effects here; the execution loop
/// owns status transitions and error/cancel blocks.
#[derive(Debug, Default)]
pub struct RenderDispatcher {
    placeholder_cleared: bool,
}

impl RenderDispatcher {
    /// Creates a dispatcher with fresh render state.
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_placeholder_once(&mut self, target: &mut dyn OutputTarget) {
        if !self.placeholder_cleared {
            target.clear_placeholder();
            self.placeholder_cleared = true;
        }
    }

    /// Renders one event into the target.
    pub fn apply(&mut self, event: &StreamEvent, target: &mut dyn OutputTarget) {
        match event {
            StreamEvent::HtmlChunk { content } => {
                self.clear_placeholder_once(target);
                target.append_html(content);
                target.scroll_to_end();
            }
            StreamEvent::TextChunk { content } => {
                self.clear_placeholder_once(target);
                target.append_text(TEXT_REGION_ID, content);
                target.scroll_to_end();
            }
            StreamEvent::MarkdownUpdate {
                container_id,
                content,
            } => {
                self.clear_placeholder_once(target);
                target.set_region(container_id, content);
                target.scroll_to_end();
            }
            StreamEvent::FinalContent {
                container_id,
                content,
            } => {
                target.remove_region(container_id);
                target.remove_region(TEXT_REGION_ID);
                target.append_final_block(content);
                target.scroll_to_end();
            }
            StreamEvent::Complete { .. } | StreamEvent::Error { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemoryTarget, RenderedBlock};

    fn markdown(container_id: &str, content: &str) -> StreamEvent {
        StreamEvent::MarkdownUpdate {
            container_id: container_id.into(),
            content: content.into(),
        }
    }

    #[test]
    fn repeated_markdown_updates_are_last_write_wins() {
        let mut dispatcher = RenderDispatcher::new();
        let mut target = MemoryTarget::new();
        dispatcher.apply(&markdown("md-1", "A"), &mut target);
        dispatcher.apply(&markdown("md-1", "B"), &mut target);
        assert_eq!(target.region_html("md-1"), Some("B"));
    }

    #[test]
    fn final_content_supersedes_markdown_and_text() {
        let mut dispatcher = RenderDispatcher::new();
        let mut target = MemoryTarget::new();
        dispatcher.apply(&markdown("md-1", "B"), &mut target);
        dispatcher.apply(
            &StreamEvent::TextChunk {
                content: "raw".into(),
            },
            &mut target,
        );
        dispatcher.apply(
            &StreamEvent::FinalContent {
                container_id: "md-1".into(),
                content: "<b>final</b>".into(),
            },
            &mut target,
        );

        assert_eq!(target.region_html("md-1"), None);
        assert_eq!(target.text_content(TEXT_REGION_ID), None);
        assert_eq!(
            target.blocks(),
            &[RenderedBlock::FinalBlock("<b>final</b>".into())]
        );
    }

    #[test]
    fn placeholder_is_removed_exactly_once() {
        let mut dispatcher = RenderDispatcher::new();
        let mut target = MemoryTarget::with_placeholder();
        dispatcher.apply(
            &StreamEvent::HtmlChunk {
                content: "<p>1</p>".into(),
            },
            &mut target,
        );
        dispatcher.apply(
            &StreamEvent::HtmlChunk {
                content: "<p>2</p>".into(),
            },
            &mut target,
        );
        assert!(!target.has_placeholder());
        assert_eq!(target.blocks().len(), 2);
    }

    #[test]
    fn text_chunks_accumulate_in_one_region() {
        let mut dispatcher = RenderDispatcher::new();
        let mut target = MemoryTarget::new();
        dispatcher.apply(
            &StreamEvent::TextChunk { content: "a".into() },
            &mut target,
        );
        dispatcher.apply(
            &StreamEvent::TextChunk { content: "b".into() },
            &mut target,
        );
        assert_eq!(target.text_content(TEXT_REGION_ID), Some("ab"));
        assert_eq!(target.blocks().len(), 1);
    }
}
