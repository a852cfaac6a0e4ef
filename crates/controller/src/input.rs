/// Separates clicks from drags by travel distance and press duration.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    max_distance_px: f64,
    max_elapsed_ms: f64,
    down: Option<([f64; 2], f64)>,
}

impl ClickTracker {
    pub fn new(max_distance_px: f64, max_elapsed_ms: f64) -> Self {
        Self {
            max_distance_px,
            max_elapsed_ms,
            down: None,
        }
    }

    pub fn pointer_down(&mut self, pos: [f64; 2], now_ms: f64) {
        self.down = Some((pos, now_ms));
    }

    /// Whether the release completes a click. A release without a recorded
    /// press never does.
    pub fn pointer_up(&mut self, pos: [f64; 2], now_ms: f64) -> bool {
        let Some((start, at)) = self.down.take() else {
            return false;
        };
        let dx = pos[0] - start[0];
        let dy = pos[1] - start[1];
        let distance = (dx * dx + dy * dy).sqrt();
        distance <= self.max_distance_px && now_ms - at <= self.max_elapsed_ms
    }

    pub fn reset(&mut self) {
        self.down = None;
    }
}

/// Client-space rectangle of the map container.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Edges inclusive.
    pub fn contains(&self, client: [f64; 2]) -> bool {
        let [x, y] = client;
        x >= self.left && x <= self.left + self.width && y >= self.top && y <= self.top + self.height
    }

    /// Client pixels to normalized device coordinates (+y up). `None` for
    /// a collapsed container.
    pub fn to_ndc(&self, client: [f64; 2]) -> Option<[f64; 2]> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some([
            (client[0] - self.left) / self.width * 2.0 - 1.0,
            -((client[1] - self.top) / self.height) * 2.0 + 1.0,
        ])
    }
}

/// Short-lived memo of the container rect, so hover hit-tests avoid a
/// layout query per event.
#[derive(Debug, Clone)]
pub struct RectCache {
    ttl_ms: f64,
    cached: Option<(ContainerRect, f64)>,
}

impl RectCache {
    pub fn new(ttl_ms: f64) -> Self {
        Self { ttl_ms, cached: None }
    }

    pub fn get_or_refresh<F: FnOnce() -> ContainerRect>(
        &mut self,
        now_ms: f64,
        measure: F,
    ) -> ContainerRect {
        if let Some((rect, at)) = self.cached
            && now_ms - at <= self.ttl_ms
        {
            return rect;
        }
        let rect = measure();
        self.cached = Some((rect, now_ms));
        rect
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
