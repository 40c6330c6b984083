// remoted-udev - device discovery helper
// Resolves the two event-device indices of a composite remote from the
// DEVPATH udev hands us, for use in an IMPORT{program} rule

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use remoted_core::exit;

/// Find the eventN node below an `input/inputM` directory.
fn event_index_below(input_dir: &Path) -> Option<u32> {
    for entry in fs::read_dir(input_dir).ok()?.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("input") {
            continue;
        }
        if let Some(index) = event_index_in(&entry.path()) {
            return Some(index);
        }
    }
    None
}

fn event_index_in(input_node: &Path) -> Option<u32> {
    for entry in fs::read_dir(input_node).ok()?.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(number) = name.strip_prefix("event") else {
            continue;
        };
        if !entry.path().is_dir() {
            continue;
        }
        if let Ok(index) = number.parse() {
            return Some(index);
        }
    }
    None
}

/// Event index of one USB interface of the device, e.g. `2-1.2.2:1.0`.
fn interface_event(device_dir: &Path, prefix: &str, interface: char) -> Option<u32> {
    event_index_below(&device_dir.join(format!("{prefix}{interface}")).join("input"))
}

/// Walk from the event node named by DEVPATH up to the USB device and read
/// the event indices of interfaces 0 (keyboard half) and 1 (mouse half).
fn discover(sys_root: &Path, devpath: &str) -> Option<(u32, u32)> {
    // devpath: /devices/.../<usb-dev>/<usb-dev>:1.1/input/inputN/eventN
    let event_node = sys_root.join(devpath.trim_start_matches('/'));
    let input_node = event_node.parent()?;
    let input_dir = input_node.parent()?;
    let iface_dir = input_dir.parent()?;
    let device_dir = iface_dir.parent()?;

    // "2-1.2.2:1.1" -> interface prefix "2-1.2.2:1."
    let iface = iface_dir.file_name()?.to_str()?;
    let mut prefix = iface.to_string();
    prefix.pop()?;
    if !prefix.ends_with('.') {
        return None;
    }

    let kbd = interface_event(device_dir, &prefix, '0')?;
    let mouse = interface_event(device_dir, &prefix, '1')?;
    Some((kbd, mouse))
}

fn main() -> ExitCode {
    let Ok(devpath) = env::var("DEVPATH") else {
        eprintln!("DEVPATH is not set");
        return ExitCode::from(exit::USAGE);
    };

    match discover(&PathBuf::from("/sys"), &devpath) {
        Some((kbd, mouse)) => {
            // The space is escaped for udev's IMPORT line parser.
            println!("REMOTED_EVENTS={kbd}\\x20{mouse}");
            ExitCode::from(exit::OK)
        }
        None => ExitCode::from(exit::UNAVAILABLE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out a fake sysfs: two interfaces below one USB device, each with
    /// an input/inputN/eventN chain.
    fn fake_sysfs(root: &Path) -> String {
        let device = "devices/pci0000:00/usb2/2-1/2-1.2";
        for (iface, input, event) in [("2-1.2:1.0", "input7", "event7"), ("2-1.2:1.1", "input8", "event8")]
        {
            fs::create_dir_all(
                root.join(device)
                    .join(iface)
                    .join("input")
                    .join(input)
                    .join(event),
            )
            .unwrap();
        }
        format!("/{device}/2-1.2:1.1/input/input8/event8")
    }

    #[test]
    fn test_discover_reads_both_interfaces() {
        let dir = tempfile::tempdir().unwrap();
        let devpath = fake_sysfs(dir.path());
        assert_eq!(discover(dir.path(), &devpath), Some((7, 8)));
    }

    #[test]
    fn test_discover_rejects_foreign_topology() {
        let dir = tempfile::tempdir().unwrap();
        // An interface name without the trailing ".N" shape.
        let device = dir.path().join("devices/platform/i8042/serio0");
        fs::create_dir_all(device.join("input/input3/event3")).unwrap();
        assert_eq!(
            discover(dir.path(), "/devices/platform/i8042/serio0/input/input3/event3"),
            None
        );
    }

    #[test]
    fn test_discover_requires_the_partner_interface() {
        let dir = tempfile::tempdir().unwrap();
        let device = "devices/pci0000:00/usb2/2-1/2-1.2";
        fs::create_dir_all(
            dir.path()
                .join(device)
                .join("2-1.2:1.0/input/input7/event7"),
        )
        .unwrap();
        assert_eq!(
            discover(dir.path(), &format!("/{device}/2-1.2:1.0/input/input7/event7")),
            None
        );
    }
}
