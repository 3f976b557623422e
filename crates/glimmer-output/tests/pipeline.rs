//! Cross-crate pipeline tests
//!
//! Drives the structure adapters through the public surface only: painting
//! derived from topology layouts, the uniform output contract, and the
//! settings-change path, all observed on the simulator command queue.

use glimmer_core::{
    Color, ColorTransform, CommandSink, DeviceSettings, LinkConfig, Output, PixelAddress, Settings,
    SettingsEvent, SettingsHandle, StripSpec,
};
use glimmer_output::{DomeAddressMap, DomeOutput, GridOutput, PolyOutput};
use glimmer_topology::{Graph, StrutRegistry};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Stand-in for the external dome wiring table: 8 struts per control box,
/// 30 LEDs per strut.
struct FixedWidthMap;

impl DomeAddressMap for FixedWidthMap {
    fn locate(&self, strut: usize, led: usize) -> Option<(usize, usize)> {
        Some((strut / 8, (strut % 8) * 30 + led))
    }
}

#[test]
fn concentric_layout_paints_the_dome() {
    init_tracing();

    // A small wheel frame: hub 0, rim 1..=5.
    let graph = Graph::new(&[
        (0, 1),
        (0, 2),
        (0, 3),
        (0, 4),
        (0, 5),
        (1, 2),
        (2, 3),
        (3, 4),
        (4, 5),
        (5, 1),
    ]);
    let registry = StrutRegistry::uniform(graph.strut_count(), 30, 2);
    let layouts = graph
        .concentric_from_starting_points(&registry, &[vec![0]], 1)
        .unwrap();

    let (sink, commands) = CommandSink::channel();
    let dome = DomeOutput::new(
        glimmer_core::DomeSettings {
            enabled: true,
            ports: vec!["box-0".into(), "box-1".into()],
            baud: 115_200,
            threaded: false,
            device_length: 240,
        },
        Box::new(FixedWidthMap),
        ColorTransform::identity(),
        sink,
    );

    // Paint every strut of the first spoke layer end to end, the way a
    // gradient visualizer walks a segment.
    let spoke_layer = &layouts.spokes.segments()[0];
    let mut painted = 0;
    for &handle in spoke_layer.struts() {
        let strut = registry.get(handle);
        for led in 0..strut.length {
            dome.set_pixel_strut(strut.index, led, Color::from_rgb(0, led as u8, 0));
            painted += 1;
        }
    }
    dome.flush();

    // 5 spokes of trimmed length 28 each, plus the end-of-frame marker.
    assert_eq!(painted, 5 * 28);
    let received: Vec<_> = commands.try_iter().collect();
    assert_eq!(received.len(), painted + 1);
    assert!(received[..painted].iter().all(|c| !c.end_of_frame));
    assert!(received[painted].end_of_frame);
    assert_eq!(
        received[0].address,
        PixelAddress::Strut { strut: 0, led: 0 }
    );
}

#[test]
fn grid_honors_the_uniform_output_contract() {
    init_tracing();

    let (sink, commands) = CommandSink::channel();
    let grid = GridOutput::new(
        "board",
        glimmer_core::GridSettings {
            device: DeviceSettings {
                enabled: true,
                link: LinkConfig::Serial {
                    port: "board".into(),
                    baud: 115_200,
                },
                threaded: false,
            },
            row_length: 5,
            rows: 6,
            rows_per_strip: 3,
        },
        ColorTransform::identity(),
        sink,
    );

    let output: &dyn Output = &grid;
    assert!(output.enabled());
    assert!(!output.active());

    output.set_pixel(3, Color::from_rgb(7, 7, 7));
    output.set_pixel(3, Color::from_rgb(8, 8, 8));
    output.flush();

    // Last-write-wins is the device's business; the simulator stream
    // reflects every write in order, then the frame boundary.
    let received: Vec<_> = commands.try_iter().collect();
    assert_eq!(received.len(), 3);
    assert_eq!(received[0].address, PixelAddress::Linear(3));
    assert_eq!(received[1].color, Color::from_rgb(8, 8, 8));
    assert!(received[2].end_of_frame);
}

#[test]
fn settings_events_drive_adapter_reconfiguration() {
    init_tracing();

    let handle = SettingsHandle::new(Settings::default());
    let events = handle.subscribe();

    let poly = PolyOutput::new(
        handle.snapshot().poly,
        ColorTransform::identity(),
        CommandSink::disconnected(),
    );
    assert!(!poly.enabled());

    handle.update(|s| {
        s.poly.device.enabled = true;
        s.poly.strips = vec![
            StripSpec {
                channel: 0,
                length: 24,
            },
            StripSpec {
                channel: 0,
                length: 24,
            },
        ];
    });

    // The wiring a configuration window performs: forward each section
    // event to the owning adapter.
    for event in events.try_iter() {
        if event == SettingsEvent::Poly {
            poly.apply_settings(&handle.snapshot().poly).unwrap();
        }
    }
    assert!(poly.enabled());
}
