//! Pointer gestures to committed annotations.
//!
//! Highlight, underline and comment commit on pointer-down. The signature tool
//! buffers points between pointer-down and pointer-up and commits only when at
//! least two points were captured. Comment text comes from a caller-supplied
//! [`CommentPrompt`], awaited as an explicit suspension point.

use crate::annotation::{Annotation, Color, Point, Stroke, Tool};
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    SignatureDrawing,
}

/// What a single input event did.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Nothing happened (no tool, or no gesture in progress).
    Ignored,
    /// A gesture produced an annotation; the caller stores it.
    Committed(Annotation),
    StrokeStarted,
    /// A point was added to the live stroke.
    StrokeExtended,
    /// A signature gesture ended with too few points.
    Discarded,
    /// The comment prompt returned no usable text.
    CommentDismissed,
}

impl CaptureOutcome {
    /// Whether the overlay must be repainted after this outcome.
    pub fn needs_render(&self) -> bool {
        matches!(self, Self::Committed(_) | Self::StrokeExtended)
    }

    pub fn committed(&self) -> Option<&Annotation> {
        match self {
            Self::Committed(annotation) => Some(annotation),
            _ => None,
        }
    }
}

/// Source of comment text. `None` means cancelled.
pub trait CommentPrompt {
    fn request_text(&mut self, anchor: Point) -> impl Future<Output = Option<String>>;
}

impl<F, Fut> CommentPrompt for F
where
    F: FnMut(Point) -> Fut,
    Fut: Future<Output = Option<String>>,
{
    fn request_text(&mut self, anchor: Point) -> impl Future<Output = Option<String>> {
        self(anchor)
    }
}

/// Prompt that never supplies text, for hosts without a text input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl CommentPrompt for NoPrompt {
    async fn request_text(&mut self, _anchor: Point) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaptureStateMachine {
    tool: Tool,
    color: Color,
    state: CaptureState,
    stroke: Vec<Point>,
    // Color at pointer-down; a color change mid-stroke applies to the next one.
    stroke_color: Color,
}

impl CaptureStateMachine {
    pub fn new(color: Color) -> Self {
        Self { color, stroke_color: color, ..Self::default() }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Arm a new tool. A signature in progress is finished first, exactly as
    /// if the pointer had been released.
    pub fn select_tool(&mut self, tool: Tool) -> CaptureOutcome {
        let outcome = self.finish_gesture();
        if self.tool != tool {
            log::debug!("tool {:?} -> {:?}", self.tool, tool);
        }
        self.tool = tool;
        outcome
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub async fn pointer_down<P>(&mut self, position: Point, prompt: &mut P) -> CaptureOutcome
    where
        P: CommentPrompt,
    {
        match self.tool {
            Tool::None => CaptureOutcome::Ignored,
            Tool::Highlight => self.commit(Annotation::highlight(position, self.color)),
            Tool::Underline => self.commit(Annotation::underline(position, self.color)),
            Tool::Comment => {
                let color = self.color;
                let text = prompt.request_text(position).await;
                match text.and_then(|text| Annotation::comment(position, color, text)) {
                    Some(annotation) => self.commit(annotation),
                    None => {
                        log::debug!("comment at ({}, {}) dismissed", position.x, position.y);
                        CaptureOutcome::CommentDismissed
                    }
                }
            }
            Tool::Signature => {
                if self.state == CaptureState::SignatureDrawing {
                    return CaptureOutcome::Ignored;
                }
                self.state = CaptureState::SignatureDrawing;
                self.stroke.clear();
                self.stroke.push(position);
                self.stroke_color = self.color;
                CaptureOutcome::StrokeStarted
            }
        }
    }

    pub fn pointer_move(&mut self, position: Point) -> CaptureOutcome {
        if self.state != CaptureState::SignatureDrawing {
            return CaptureOutcome::Ignored;
        }
        self.stroke.push(position);
        CaptureOutcome::StrokeExtended
    }

    pub fn pointer_up(&mut self) -> CaptureOutcome {
        self.finish_gesture()
    }

    /// Commit or discard the live stroke and return to `Idle`.
    pub fn finish_gesture(&mut self) -> CaptureOutcome {
        if self.state != CaptureState::SignatureDrawing {
            return CaptureOutcome::Ignored;
        }
        self.state = CaptureState::Idle;
        let points = std::mem::take(&mut self.stroke);

        if points.len() < Stroke::MIN_POINTS {
            log::debug!("signature with {} point(s) discarded", points.len());
            return CaptureOutcome::Discarded;
        }
        match Annotation::signature(self.stroke_color, points) {
            Some(annotation) => self.commit(annotation),
            None => CaptureOutcome::Discarded,
        }
    }

    /// Drop any live stroke without committing it. Returns whether one existed.
    pub fn cancel_gesture(&mut self) -> bool {
        let was_drawing = self.state == CaptureState::SignatureDrawing;
        self.state = CaptureState::Idle;
        self.stroke.clear();
        was_drawing
    }

    /// The uncommitted stroke and its color while a signature is being drawn.
    pub fn live_stroke(&self) -> Option<(&[Point], Color)> {
        (self.state == CaptureState::SignatureDrawing).then_some((self.stroke.as_slice(), self.stroke_color))
    }

    fn commit(&self, annotation: Annotation) -> CaptureOutcome {
        let anchor = annotation.anchor();
        log::debug!("committed {:?} at ({}, {})", annotation.kind(), anchor.x, anchor.y);
        CaptureOutcome::Committed(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;
    use pollster::block_on;
    use std::future::ready;

    fn down(machine: &mut CaptureStateMachine, x: f32, y: f32) -> CaptureOutcome {
        block_on(machine.pointer_down(Point::new(x, y), &mut NoPrompt))
    }

    #[test]
    fn no_tool_ignores_everything() {
        let mut machine = CaptureStateMachine::new(Color::RED);
        assert_eq!(down(&mut machine, 1.0, 1.0), CaptureOutcome::Ignored);
        assert_eq!(machine.pointer_move(Point::new(2.0, 2.0)), CaptureOutcome::Ignored);
        assert_eq!(machine.pointer_up(), CaptureOutcome::Ignored);
    }

    #[test]
    fn highlight_commits_on_pointer_down() {
        let mut machine = CaptureStateMachine::new(Color::RED);
        machine.select_tool(Tool::Highlight);

        let outcome = down(&mut machine, 150.0, 100.0);
        assert_eq!(
            outcome,
            CaptureOutcome::Committed(Annotation::highlight(Point::new(150.0, 100.0), Color::RED))
        );
        assert!(outcome.needs_render());
        assert_eq!(machine.state(), CaptureState::Idle);
    }

    #[test]
    fn underline_uses_current_color() {
        let mut machine = CaptureStateMachine::new(Color::RED);
        machine.select_tool(Tool::Underline);
        machine.set_color(Color::BLUE);

        let outcome = down(&mut machine, 5.0, 6.0);
        assert_eq!(outcome.committed().map(Annotation::color), Some(Color::BLUE));
        assert_eq!(outcome.committed().map(Annotation::kind), Some(AnnotationKind::Underline));
    }

    #[test]
    fn comment_awaits_prompt() {
        let mut machine = CaptureStateMachine::new(Color::BLUE);
        machine.select_tool(Tool::Comment);

        let mut asked = Vec::new();
        let mut prompt = |anchor: Point| {
            asked.push(anchor);
            ready(Some("check this".to_string()))
        };
        let outcome = block_on(machine.pointer_down(Point::new(40.0, 50.0), &mut prompt));

        assert_eq!(asked, vec![Point::new(40.0, 50.0)]);
        let Some(Annotation::Comment { text, anchor, .. }) = outcome.committed() else {
            panic!("expected a comment, got {outcome:?}");
        };
        assert_eq!(text.as_str(), "check this");
        assert_eq!(*anchor, Point::new(40.0, 50.0));
    }

    #[test]
    fn cancelled_or_blank_comment_commits_nothing() {
        let mut machine = CaptureStateMachine::new(Color::BLUE);
        machine.select_tool(Tool::Comment);

        assert_eq!(down(&mut machine, 1.0, 1.0), CaptureOutcome::CommentDismissed);

        let mut blank = |_: Point| ready(Some("   ".to_string()));
        let outcome = block_on(machine.pointer_down(Point::new(1.0, 1.0), &mut blank));
        assert_eq!(outcome, CaptureOutcome::CommentDismissed);
        assert!(!outcome.needs_render());
    }

    #[test]
    fn signature_commits_full_stroke() {
        let mut machine = CaptureStateMachine::new(Color::BLACK);
        machine.select_tool(Tool::Signature);

        assert_eq!(down(&mut machine, 10.0, 10.0), CaptureOutcome::StrokeStarted);
        assert_eq!(machine.state(), CaptureState::SignatureDrawing);
        assert_eq!(machine.pointer_move(Point::new(20.0, 15.0)), CaptureOutcome::StrokeExtended);
        assert_eq!(machine.pointer_move(Point::new(30.0, 25.0)), CaptureOutcome::StrokeExtended);
        assert_eq!(machine.live_stroke().map(|(points, _)| points.len()), Some(3));

        let Some(Annotation::Signature { anchor, stroke, color }) = machine.pointer_up().committed().cloned()
        else {
            panic!("expected a signature");
        };
        assert_eq!(anchor, Point::new(10.0, 10.0));
        assert_eq!(color, Color::BLACK);
        assert_eq!(
            stroke.points(),
            &[Point::new(10.0, 10.0), Point::new(20.0, 15.0), Point::new(30.0, 25.0)]
        );
        assert_eq!(machine.state(), CaptureState::Idle);
        assert!(machine.live_stroke().is_none());
    }

    #[test]
    fn single_point_signature_is_discarded() {
        let mut machine = CaptureStateMachine::new(Color::BLACK);
        machine.select_tool(Tool::Signature);

        down(&mut machine, 10.0, 10.0);
        assert_eq!(machine.pointer_up(), CaptureOutcome::Discarded);
        assert_eq!(machine.state(), CaptureState::Idle);
    }

    #[test]
    fn two_point_signature_is_committed() {
        let mut machine = CaptureStateMachine::new(Color::BLACK);
        machine.select_tool(Tool::Signature);

        down(&mut machine, 10.0, 10.0);
        machine.pointer_move(Point::new(11.0, 11.0));
        let Some(Annotation::Signature { stroke, .. }) = machine.pointer_up().committed().cloned() else {
            panic!("expected a signature");
        };
        assert_eq!(stroke.len(), 2);
    }

    #[test]
    fn tool_switch_finishes_the_live_stroke() {
        let mut machine = CaptureStateMachine::new(Color::BLACK);
        machine.select_tool(Tool::Signature);
        down(&mut machine, 1.0, 1.0);
        machine.pointer_move(Point::new(2.0, 2.0));

        let outcome = machine.select_tool(Tool::Highlight);
        assert!(matches!(outcome, CaptureOutcome::Committed(Annotation::Signature { .. })));
        assert_eq!(machine.state(), CaptureState::Idle);
        assert_eq!(machine.tool(), Tool::Highlight);

        machine.select_tool(Tool::Signature);
        down(&mut machine, 1.0, 1.0);
        assert_eq!(machine.select_tool(Tool::None), CaptureOutcome::Discarded);
    }

    #[test]
    fn stroke_keeps_color_from_pointer_down() {
        let mut machine = CaptureStateMachine::new(Color::BLACK);
        machine.select_tool(Tool::Signature);
        down(&mut machine, 1.0, 1.0);
        machine.set_color(Color::GREEN);
        machine.pointer_move(Point::new(2.0, 2.0));

        assert_eq!(machine.pointer_up().committed().map(Annotation::color), Some(Color::BLACK));
        assert_eq!(machine.color(), Color::GREEN);
    }

    #[test]
    fn second_pointer_down_while_drawing_is_ignored() {
        let mut machine = CaptureStateMachine::new(Color::BLACK);
        machine.select_tool(Tool::Signature);
        down(&mut machine, 1.0, 1.0);

        assert_eq!(down(&mut machine, 5.0, 5.0), CaptureOutcome::Ignored);
        assert_eq!(machine.live_stroke().map(|(points, _)| points.to_vec()), Some(vec![Point::new(1.0, 1.0)]));
    }

    #[test]
    fn cancel_drops_the_stroke() {
        let mut machine = CaptureStateMachine::new(Color::BLACK);
        machine.select_tool(Tool::Signature);
        down(&mut machine, 1.0, 1.0);
        machine.pointer_move(Point::new(2.0, 2.0));

        assert!(machine.cancel_gesture());
        assert_eq!(machine.pointer_up(), CaptureOutcome::Ignored);
        assert!(!machine.cancel_gesture());
    }
}
