use serde::{Deserialize, Serialize};

/// Per-step losses recorded during a transfer.
///
/// `style` and `content` get one entry per step. `disc` only grows in
/// adversarial mode, one entry per critic update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LossHistory {
    pub style: Vec<f64>,
    pub content: Vec<f64>,
    pub disc: Vec<f64>,
}

/// Losses produced by one style/content step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub style: f64,
    pub content: f64,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step's losses. `disc` is `None` when no critic was trained.
    pub fn record(&mut self, losses: StepLosses, disc: Option<f64>) {
        self.style.push(losses.style);
        self.content.push(losses.content);
        if let Some(d) = disc {
            self.disc.push(d);
        }
    }

    /// Number of recorded style/content steps.
    pub fn len(&self) -> usize {
        self.style.len()
    }

    pub fn is_empty(&self) -> bool {
        self.style.is_empty()
    }

    /// Most recent `(style, content, disc)` values.
    pub fn latest(&self) -> Option<(f64, f64, Option<f64>)> {
        let style = *self.style.last()?;
        let content = *self.content.last()?;
        Some((style, content, self.disc.last().copied()))
    }

    /// Progress line for the latest step, e.g. `Style: 1.2 Content: 0.3 Disc: 1.4`.
    pub fn display(&self) -> String {
        match self.latest() {
            None => "no data".to_string(),
            Some((style, content, Some(disc))) => {
                format!("Style: {style:.1} Content: {content:.1} Disc: {disc:.1}")
            }
            Some((style, content, None)) => format!("Style: {style:.1} Content: {content:.1}"),
        }
    }

    /// Warnings for values that signal a diverged run.
    pub fn health_check(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (name, values) in [
            ("style", &self.style),
            ("content", &self.content),
            ("disc", &self.disc),
        ] {
            if let Some(step) = values.iter().position(|v| !v.is_finite()) {
                warnings.push(format!("{name} loss is non-finite since step {step}"));
            }
        }
        warnings
    }
}
