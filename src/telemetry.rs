use crate::events::TelemetrySnapshot;
use tracing::info;

/// Renders flight data as one status line per snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryReporter;

impl TelemetryReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(snapshot: &TelemetrySnapshot) -> String {
        format!(
            "Batt: {}%, Height: {:.1}m, Hover: {}, Sky: {}, Ground: {}, Open: {}, WifiStrength: {}",
            snapshot.battery_percentage,
            snapshot.height_m(),
            snapshot.hovering,
            snapshot.in_sky,
            snapshot.on_ground,
            snapshot.em_open,
            snapshot.wifi_strength
        )
    }

    /// Emit the status line and hand it back
    pub fn report(&self, snapshot: &TelemetrySnapshot) -> String {
        let line = Self::render(snapshot);
        info!(target: "skycam::telemetry", "{}", line);
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_format() {
        let snapshot = TelemetrySnapshot {
            battery_percentage: 87,
            height_dm: 15,
            hovering: true,
            in_sky: true,
            on_ground: false,
            em_open: false,
            wifi_strength: 90,
        };

        assert_eq!(
            TelemetryReporter::new().report(&snapshot),
            "Batt: 87%, Height: 1.5m, Hover: true, Sky: true, Ground: false, Open: false, WifiStrength: 90"
        );
    }

    #[test]
    fn test_negative_height_renders() {
        let snapshot = TelemetrySnapshot {
            height_dm: -3,
            ..Default::default()
        };
        assert!(TelemetryReporter::render(&snapshot).contains("Height: -0.3m"));
    }
}
