//! The whiteboard: bitmap, pen, stroke lifecycle and history.

use crate::brush::BrushSettings;
use crate::color::Rgba;
use crate::history::History;
use crate::snapshot::{Snapshot, SnapshotError};
use crate::surface::Surface;
use kurbo::Point;

/// Whether a finished stroke (or other edit) changed the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeOutcome {
    Unchanged,
    Changed,
}

impl StrokeOutcome {
    pub fn is_changed(self) -> bool {
        self == StrokeOutcome::Changed
    }
}

/// A stroke between pointer down and pointer up.
#[derive(Debug, Clone)]
struct ActiveStroke {
    /// Pen captured when the stroke began.
    brush: BrushSettings,
    last: Point,
    /// Board state before the stroke, committed to history on the first painted segment.
    before: Option<Snapshot>,
    painted: bool,
}

/// A freehand drawing board backed by a single bitmap.
#[derive(Debug, Clone)]
pub struct Whiteboard {
    surface: Surface,
    brush: BrushSettings,
    history: History,
    stroke: Option<ActiveStroke>,
    /// Bumped on every pixel change.
    revision: u64,
    /// Local changes not yet persisted.
    dirty: bool,
}

impl Whiteboard {
    /// Create a blank board.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Surface::new(width, height),
            brush: BrushSettings::default(),
            history: History::new(),
            stroke: None,
            revision: 0,
            dirty: false,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn size(&self) -> (u32, u32) {
        self.surface.size()
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    pub fn set_brush(&mut self, brush: BrushSettings) {
        self.brush = brush;
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.brush.color = color;
    }

    /// Set the pen width (clamped to the allowed range).
    pub fn set_line_width(&mut self, width: f64) {
        self.brush.set_width(width);
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn is_blank(&self) -> bool {
        self.surface.is_blank()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // --- Stroke lifecycle ---

    /// Start a stroke at `point`. Nothing is painted until the pointer moves.
    pub fn begin_stroke(&mut self, point: Point) -> Result<(), SnapshotError> {
        if self.stroke.is_some() {
            self.end_stroke();
        }
        let before = self.snapshot()?;
        self.stroke = Some(ActiveStroke {
            brush: self.brush,
            last: point,
            before: Some(before),
            painted: false,
        });
        Ok(())
    }

    /// Continue the active stroke to `point`. Ignored when not drawing.
    ///
    /// Returns true if pixels changed.
    pub fn extend_stroke(&mut self, point: Point) -> bool {
        let Some(stroke) = self.stroke.as_mut() else {
            return false;
        };

        let painted = self.surface.stroke_segment(stroke.last, point, &stroke.brush);
        stroke.last = point;
        if !painted {
            return false;
        }

        if let Some(before) = stroke.before.take() {
            self.history.record(before);
        }
        stroke.painted = true;
        self.touch();
        true
    }

    /// Finish the active stroke.
    pub fn end_stroke(&mut self) -> StrokeOutcome {
        match self.stroke.take() {
            Some(stroke) if stroke.painted => StrokeOutcome::Changed,
            _ => StrokeOutcome::Unchanged,
        }
    }

    // --- Whole-board edits ---

    /// Erase everything. Undoable; a blank board is left untouched.
    pub fn clear(&mut self) -> Result<bool, SnapshotError> {
        self.end_stroke();
        if self.surface.is_blank() {
            return Ok(false);
        }
        let before = self.snapshot()?;
        self.history.record(before);
        self.surface.clear();
        self.touch();
        Ok(true)
    }

    /// Undo the last change. Returns true if the board changed.
    pub fn undo(&mut self) -> Result<bool, SnapshotError> {
        self.end_stroke();
        if !self.history.can_undo() {
            return Ok(false);
        }
        let current = self.snapshot()?;
        match self.history.undo(current) {
            Some(previous) => {
                self.restore(&previous)?;
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Redo the last undone change. Returns true if the board changed.
    pub fn redo(&mut self) -> Result<bool, SnapshotError> {
        self.end_stroke();
        if !self.history.can_redo() {
            return Ok(false);
        }
        let current = self.snapshot()?;
        match self.history.redo(current) {
            Some(next) => {
                self.restore(&next)?;
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Encode the current bitmap.
    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Snapshot::capture(&self.surface)
    }

    /// Replace the bitmap with a snapshot, leaving history alone.
    ///
    /// A snapshot of another size is drawn at the top-left of a blank board of the current size.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let decoded = snapshot.decode()?;
        if decoded.size() == self.surface.size() {
            self.surface = decoded;
        } else {
            let (width, height) = self.surface.size();
            let mut surface = Surface::new(width, height);
            surface.draw_surface(&decoded, 0, 0);
            self.surface = surface;
        }
        self.touch();
        Ok(())
    }

    /// Apply a snapshot pushed by the remote store. Undoable locally.
    pub fn apply_remote(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.end_stroke();
        let before = self.snapshot()?;
        self.restore(snapshot)?;
        self.history.record(before);
        self.dirty = false;
        Ok(())
    }

    /// Change the bitmap size, keeping content anchored at the top-left.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width.max(1), height.max(1)) == self.surface.size() {
            return;
        }
        self.surface = self.surface.resized(width, height);
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.dirty = true;
    }
}
