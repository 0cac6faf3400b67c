//! Scroll position bookkeeping.

/// Side of the window a scroll position is approaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Older data, before the window.
    Start,
    /// Newer data, after the window.
    End,
}

impl Edge {
    /// The other side of the window.
    pub fn opposite(self) -> Self {
        match self {
            Edge::Start => Edge::End,
            Edge::End => Edge::Start,
        }
    }
}

/// How the caller should move its scroll position after a load.
///
/// Positions are indices into the window of the first visible candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCorrection {
    /// The window was replaced; scroll to this position.
    JumpTo(usize),
    /// The window shifted; add this delta to the current position.
    Shift(isize),
}

impl ScrollCorrection {
    /// Applies the correction to `position`, clamping at zero.
    pub fn apply(self, position: usize) -> usize {
        match self {
            ScrollCorrection::JumpTo(target) => target,
            ScrollCorrection::Shift(delta) => position.saturating_add_signed(delta),
        }
    }
}

/// First visible position that puts the last `visible_count` candles on screen.
pub fn tail_position(window_len: usize, visible_count: usize) -> usize {
    window_len.saturating_sub(visible_count)
}

/// Reports which edge, if any, the visible range is within `threshold` candles of.
///
/// When both edges are that close, the nearer one wins and ties go to
/// [`Edge::End`].
pub fn edge_proximity(
    first_visible: usize,
    visible_count: usize,
    window_len: usize,
    threshold: usize,
) -> Option<Edge> {
    let to_start = edge_distance(Edge::Start, first_visible, visible_count, window_len);
    let to_end = edge_distance(Edge::End, first_visible, visible_count, window_len);

    match (to_start < threshold, to_end < threshold) {
        (true, true) if to_start < to_end => Some(Edge::Start),
        (true, true) => Some(Edge::End),
        (true, false) => Some(Edge::Start),
        (false, true) => Some(Edge::End),
        (false, false) => None,
    }
}

/// Candles between the visible range and `edge` of the window.
pub fn edge_distance(
    edge: Edge,
    first_visible: usize,
    visible_count: usize,
    window_len: usize,
) -> usize {
    match edge {
        Edge::Start => first_visible,
        Edge::End => window_len.saturating_sub(first_visible.saturating_add(visible_count)),
    }
}
