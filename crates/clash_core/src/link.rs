//! Engagement links: the beams drawn from an attacker to whoever it hits.
//!
//! Drawing is somebody else's job. The core talks to it through the
//! [`LinkDisplay`] trait and keeps a [`LinkRegistry`] that maps each
//! ordered (attacker, target) pair to one display handle. Handles come
//! from a pool that is filled ahead of need and only ever grows; a link
//! that is no longer wanted is hidden, never destroyed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combatant::CombatantId;
use crate::math::Vec2Fixed;

/// Segment count of a visible link (one straight beam, two endpoints).
pub const VISIBLE_SEGMENTS: u8 = 2;

/// Segment count of a hidden link.
pub const HIDDEN_SEGMENTS: u8 = 0;

/// An 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    #[serde(default = "opaque")]
    pub a: u8,
}

const fn opaque() -> u8 {
    u8::MAX
}

impl Rgba {
    /// Opaque colour from its three channels.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Pure red.
    pub const RED: Self = Self::rgb(255, 0, 0);
    /// Pure green.
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    /// Pure blue.
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    /// White.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Opaque id of one drawable link owned by a [`LinkDisplay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkHandle(pub u32);

/// Whatever actually draws links.
pub trait LinkDisplay {
    /// Allocate a new, hidden link.
    fn create(&mut self) -> LinkHandle;

    /// Move both ends of a link.
    fn set_endpoints(&mut self, handle: LinkHandle, from: Vec2Fixed, to: Vec2Fixed);

    /// Recolour a link.
    fn set_color(&mut self, handle: LinkHandle, color: Rgba);

    /// Show ([`VISIBLE_SEGMENTS`]) or hide ([`HIDDEN_SEGMENTS`]) a link.
    fn set_visible_segment_count(&mut self, handle: LinkHandle, count: u8);
}

/// Last state pushed to one link of a [`LineBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineState {
    /// Attacker end.
    pub from: Vec2Fixed,
    /// Target end.
    pub to: Vec2Fixed,
    /// Current colour.
    pub color: Rgba,
    /// Segment count; zero means hidden.
    pub segments: u8,
}

impl LineState {
    /// Whether the line is drawn.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.segments > HIDDEN_SEGMENTS
    }
}

impl Default for LineState {
    fn default() -> Self {
        Self {
            from: Vec2Fixed::ZERO,
            to: Vec2Fixed::ZERO,
            color: Rgba::default(),
            segments: HIDDEN_SEGMENTS,
        }
    }
}

/// In-memory [`LinkDisplay`] that records the state of every link.
///
/// Used by headless runs and tests in place of a renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<LineState>,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one link.
    #[must_use]
    pub fn line(&self, handle: LinkHandle) -> Option<&LineState> {
        self.lines.get(handle.0 as usize)
    }

    /// Number of links ever created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no link was created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of links currently drawn.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.lines.iter().filter(|line| line.is_visible()).count()
    }

    fn line_mut(&mut self, handle: LinkHandle) -> Option<&mut LineState> {
        self.lines.get_mut(handle.0 as usize)
    }
}

impl LinkDisplay for LineBuffer {
    fn create(&mut self) -> LinkHandle {
        let handle = LinkHandle(self.lines.len() as u32);
        self.lines.push(LineState::default());
        handle
    }

    fn set_endpoints(&mut self, handle: LinkHandle, from: Vec2Fixed, to: Vec2Fixed) {
        if let Some(line) = self.line_mut(handle) {
            line.from = from;
            line.to = to;
        }
    }

    fn set_color(&mut self, handle: LinkHandle, color: Rgba) {
        if let Some(line) = self.line_mut(handle) {
            line.color = color;
        }
    }

    fn set_visible_segment_count(&mut self, handle: LinkHandle, count: u8) {
        if let Some(line) = self.line_mut(handle) {
            line.segments = count;
        }
    }
}

/// Binds ordered (attacker, target) pairs to display handles.
///
/// A pair, once bound, keeps its handle for the registry's lifetime.
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry<D> {
    display: D,
    pool: Vec<LinkHandle>,
    claimed: usize,
    bindings: BTreeMap<(CombatantId, CombatantId), LinkHandle>,
}

impl<D: LinkDisplay> LinkRegistry<D> {
    /// Create an empty registry drawing through `display`.
    pub fn new(display: D) -> Self {
        Self {
            display,
            pool: Vec::new(),
            claimed: 0,
            bindings: BTreeMap::new(),
        }
    }

    /// The underlying display.
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Mutable access to the underlying display.
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Handles allocated so far, bound or not.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Number of bound pairs.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }

    /// Handle bound to a pair, if any.
    #[must_use]
    pub fn handle(&self, attacker: CombatantId, target: CombatantId) -> Option<LinkHandle> {
        self.bindings.get(&(attacker, target)).copied()
    }

    /// Grow the pool to at least `total` handles.
    pub fn reserve(&mut self, total: usize) {
        while self.pool.len() < total {
            let handle = self.display.create();
            self.pool.push(handle);
        }
    }

    /// Handle for a pair, binding the next free pool handle on first use.
    pub fn get_or_create(&mut self, attacker: CombatantId, target: CombatantId) -> LinkHandle {
        if let Some(handle) = self.handle(attacker, target) {
            return handle;
        }
        if self.claimed == self.pool.len() {
            let handle = self.display.create();
            self.pool.push(handle);
        }
        let handle = self.pool[self.claimed];
        self.claimed += 1;
        self.bindings.insert((attacker, target), handle);
        handle
    }

    /// Recolour a bound pair's link. Returns `false` if the pair is unbound.
    pub fn set_color(&mut self, attacker: CombatantId, target: CombatantId, color: Rgba) -> bool {
        match self.handle(attacker, target) {
            Some(handle) => {
                self.display.set_color(handle, color);
                true
            }
            None => false,
        }
    }

    /// Draw the link of a bound pair between two points.
    ///
    /// An unbound pair is logged and skipped.
    pub fn show(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        from: Vec2Fixed,
        to: Vec2Fixed,
        color: Rgba,
    ) -> bool {
        let Some(handle) = self.handle(attacker, target) else {
            tracing::warn!(%attacker, %target, "No link bound from attacker to target");
            return false;
        };
        self.display.set_color(handle, color);
        self.display.set_endpoints(handle, from, to);
        self.display
            .set_visible_segment_count(handle, VISIBLE_SEGMENTS);
        true
    }

    /// Hide the link of a bound pair.
    ///
    /// An unbound pair is logged and skipped.
    pub fn hide(&mut self, attacker: CombatantId, target: CombatantId) -> bool {
        let Some(handle) = self.handle(attacker, target) else {
            tracing::warn!(%attacker, %target, "Cannot hide link that was never bound");
            return false;
        };
        self.display.set_visible_segment_count(handle, HIDDEN_SEGMENTS);
        true
    }

    /// Hide every bound link that starts or ends at `id`.
    ///
    /// Returns how many links were hidden.
    pub fn hide_all_involving(&mut self, id: CombatantId) -> usize {
        let mut hidden = 0;
        for (&(attacker, target), &handle) in &self.bindings {
            if attacker == id || target == id {
                self.display.set_visible_segment_count(handle, HIDDEN_SEGMENTS);
                hidden += 1;
            }
        }
        hidden
    }

    /// Hide every bound link.
    pub fn hide_all(&mut self) {
        for &handle in self.bindings.values() {
            self.display.set_visible_segment_count(handle, HIDDEN_SEGMENTS);
        }
    }

    /// Bound pairs in (attacker, target) order.
    pub fn bindings(&self) -> impl Iterator<Item = (CombatantId, CombatantId, LinkHandle)> + '_ {
        self.bindings
            .iter()
            .map(|(&(attacker, target), &handle)| (attacker, target, handle))
    }
}
