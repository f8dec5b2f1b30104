use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use video_capture_core::models::config::{PREFER_USB_CAMERA_KEY, USB_CAMERA_PREFS_NAMESPACE};
use video_capture_core::sim::wait_until;
use video_capture_core::storage::PreferenceValue;
use video_capture_core::{
    ActiveInstanceRegistry, BackendKind, CaptureConstraints, CaptureController, CaptureEnvironment,
    ControllerConfig, JsonFilePreferences, MemoryPreferences, Nv21Buffer, PreferenceStore, ZoomCommands,
};

use crate::capture_state::{DemoReport, LoggingSink};
use crate::demo_platform::{demo_enumerator, demo_usb_factory, demo_usb_helper, prefers_usb};

const USB_FRAMES: usize = 5;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Run the capture demo on the simulated platform.
#[derive(Parser, Debug)]
#[command(name = "sample-app")]
#[command(about = "Capture demo for video-capture-core on simulated cameras")]
pub struct DemoOptions {
    /// Capture constraints as JSON (`deviceId`, `facingMode`, `width`, `height`, `frameRate`)
    #[arg(long, value_parser = parse_constraints, default_value = DEFAULT_CONSTRAINTS)]
    pub constraints: CaptureConstraints,

    /// Persist preferences in this JSON file instead of memory
    #[arg(long = "prefs")]
    pub prefs_path: Option<PathBuf>,

    /// Prefer the external USB camera
    #[arg(long = "usb")]
    pub prefer_usb: bool,
}

const DEFAULT_CONSTRAINTS: &str = r#"{"width":1280,"height":720,"frameRate":30}"#;

fn parse_constraints(json: &str) -> Result<CaptureConstraints, String> {
    CaptureConstraints::from_json(json).map_err(|e| e.to_string())
}

fn open_preferences(options: &DemoOptions) -> Result<Arc<dyn PreferenceStore>, String> {
    match &options.prefs_path {
        Some(path) => {
            let preferences = JsonFilePreferences::open(path);
            if options.prefer_usb {
                preferences
                    .set(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, PreferenceValue::Bool(true))
                    .map_err(|e| e.to_string())?;
            }
            Ok(Arc::new(preferences))
        }
        None => {
            let preferences = MemoryPreferences::default();
            if options.prefer_usb {
                preferences.set_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, true);
            }
            Ok(Arc::new(preferences))
        }
    }
}

/// Start a capture, zoom in and out, switch cameras, then shut down.
pub fn run_demo(options: DemoOptions) -> Result<DemoReport, String> {
    let preferences = open_preferences(&options)?;
    log::info!("USB camera preferred: {}", prefers_usb(preferences.as_ref()));

    let usb_helper = demo_usb_helper();
    let environment = CaptureEnvironment {
        enumerator: demo_enumerator(),
        preferences: Arc::clone(&preferences),
        usb: Some(demo_usb_factory(Arc::clone(&usb_helper), Arc::clone(&preferences))),
        registry: Arc::new(ActiveInstanceRegistry::new()),
    };
    let config = ControllerConfig::default();
    let commands = ZoomCommands::new(Arc::clone(&environment.registry), &config);

    let sink = LoggingSink::new();
    let controller =
        CaptureController::new(options.constraints, environment, sink.clone(), config).map_err(|e| e.to_string())?;
    controller.start_capture().map_err(|e| e.to_string())?;

    let session = controller.session_info();
    let on_usb = controller.backend_kind() == Some(BackendKind::ExternalUsb);

    if !wait_until(SETTLE_TIMEOUT, || sink.stats().started.is_some()) {
        log::warn!("No start notification within {:?}", SETTLE_TIMEOUT);
    }

    if on_usb {
        // The simulated UVC helper only produces frames when asked to.
        let frame = vec![0x80; Nv21Buffer::expected_len(1280, 720)];
        for _ in 0..USB_FRAMES {
            usb_helper.emit_frame(&frame);
        }
    }

    let zoom_in = commands.step_zoom_in();
    let zoom_out = commands.step_zoom_out();

    let switched_to_front = if on_usb {
        None
    } else {
        let was_front = controller.is_front_facing();
        controller.switch_camera();
        if !wait_until(SETTLE_TIMEOUT, || controller.is_front_facing() != was_front) {
            log::warn!("Camera switch did not complete within {:?}", SETTLE_TIMEOUT);
        }
        Some(controller.is_front_facing())
    };

    controller.stop_capture();
    controller.dispose();

    Ok(DemoReport {
        session,
        zoom_in,
        zoom_out,
        switched_to_front,
        sink: sink.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let options = DemoOptions::try_parse_from(["sample-app"]).unwrap();

        assert_eq!(options.constraints.target_width, 1280);
        assert_eq!(options.constraints.target_height, 720);
        assert_eq!(options.constraints.target_frame_rate, 30);
        assert!(options.prefs_path.is_none());
        assert!(!options.prefer_usb);
    }

    #[test]
    fn parses_constraints_prefs_and_usb() {
        let options = DemoOptions::try_parse_from([
            "sample-app",
            "--constraints",
            r#"{"deviceId":"1","width":640,"height":480,"frameRate":15}"#,
            "--prefs",
            "/tmp/prefs.json",
            "--usb",
        ])
        .unwrap();

        assert_eq!(options.constraints.device_index(), Some(1));
        assert_eq!(options.constraints.target_width, 640);
        assert_eq!(options.prefs_path, Some(PathBuf::from("/tmp/prefs.json")));
        assert!(options.prefer_usb);
    }

    #[test]
    fn rejects_invalid_constraints_and_unknown_flags() {
        let zero = r#"{"width":0,"height":480,"frameRate":15}"#;
        assert!(DemoOptions::try_parse_from(["sample-app", "--constraints", zero]).is_err());
        assert!(DemoOptions::try_parse_from(["sample-app", "--constraints", "not json"]).is_err());
        assert!(DemoOptions::try_parse_from(["sample-app", "--verbose"]).is_err());
    }
}
