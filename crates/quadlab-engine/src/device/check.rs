//! Error-checked device calls.
//!
//! Every device call is bracketed by a drain of the fault queue before the
//! call and a check after it, so a fault is always attributed to the call
//! that raised it.

use std::fmt;

use super::{Device, DeviceFault};

/// Source location and text of a wrapped device call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CallSite {
    pub call: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in '{}' line:{}", self.call, self.file, self.line)
    }
}

/// A device call left one or more faults in the queue.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{site} raised {}", summarize(.faults))]
pub struct DeviceError {
    pub site: CallSite,
    /// Never empty.
    pub faults: Vec<DeviceFault>,
}

fn summarize(faults: &[DeviceFault]) -> String {
    faults
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Drains the fault queue after the call at `site` and reports each fault.
pub fn check_and_report<D>(device: &D, site: CallSite) -> Result<(), DeviceError>
where
    D: Device + ?Sized,
{
    let faults = device.take_errors();
    if faults.is_empty() {
        return Ok(());
    }

    for fault in &faults {
        log::error!("[{}] {site}: {}", fault.kind, fault.message);
    }

    Err(DeviceError { site, faults })
}

/// Runs one device call with fault checking.
///
/// `checked!(device, device.bind_buffer(kind, Some(id)))` evaluates to
/// `Result<T, DeviceError>` where `T` is the call's return type. `device`
/// must be a reference to a [`Device`].
///
/// Builds without `debug_assertions` do not report. They discard whatever
/// the call queued and always return `Ok`.
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! checked {
    ($device:expr, $call:expr $(,)?) => {{
        let device = $device;
        $crate::device::Device::clear_errors(device);
        let value = $call;
        $crate::device::check_and_report(
            device,
            $crate::device::CallSite {
                call: stringify!($call),
                file: file!(),
                line: line!(),
            },
        )
        .map(|()| value)
    }};
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! checked {
    ($device:expr, $call:expr $(,)?) => {{
        let device = $device;
        let value = $call;
        $crate::device::Device::clear_errors(device);
        ::core::result::Result::<_, $crate::device::DeviceError>::Ok(value)
    }};
}

#[cfg(all(test, debug_assertions))]
mod tests {
    use crate::device::mock::MockDevice;
    use crate::device::{BufferKind, Device, DeviceFault, FaultKind};

    #[test]
    fn clean_call_passes_value_through() {
        let device = MockDevice::new();
        let id = checked!(&device, device.create_buffer(BufferKind::Vertex, &[0u8; 8])).unwrap();
        assert!(device.buffer_exists(id));
    }

    #[test]
    fn fault_raised_by_the_call_is_reported_with_its_site() {
        let device = MockDevice::new();
        let id = device.create_buffer(BufferKind::Index, &[]);
        device.delete_buffer(id);
        device.clear_errors();

        let err = checked!(&device, device.bind_buffer(BufferKind::Index, Some(id))).unwrap_err();

        assert_eq!(err.faults.len(), 1);
        assert_eq!(err.faults[0].kind, FaultKind::InvalidValue);
        assert!(err.site.call.contains("bind_buffer"));
        assert!(err.site.file.ends_with("check.rs"));
        assert!(err.to_string().contains("line:"));
    }

    #[test]
    fn stale_faults_are_not_blamed_on_the_next_call() {
        let device = MockDevice::new();
        device.inject_fault(DeviceFault::invalid_operation("left over"));

        let result = checked!(&device, device.use_program(None));

        assert!(result.is_ok());
        assert!(device.take_errors().is_empty());
    }

    #[test]
    fn every_queued_fault_is_returned() {
        let device = MockDevice::new();
        let err = checked!(&device, {
            device.inject_fault(DeviceFault::invalid_value("first"));
            device.inject_fault(DeviceFault::new(FaultKind::OutOfMemory, "second"));
        })
        .unwrap_err();

        let kinds: Vec<_> = err.faults.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, [FaultKind::InvalidValue, FaultKind::OutOfMemory]);
    }
}

#[cfg(test)]
mod queue_tests {
    use crate::device::mock::MockDevice;
    use crate::device::Device;

    #[test]
    fn repeated_failing_calls_leave_the_queue_empty() {
        let device = MockDevice::new();

        for _ in 0..1000 {
            let _ = checked!(&device, device.draw_indexed(6));
        }

        assert!(device.take_errors().is_empty());
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn release_build_returns_ok_and_discards_faults() {
        let device = MockDevice::new();

        let result = checked!(&device, device.draw_indexed(6));

        assert!(result.is_ok());
        assert!(device.take_errors().is_empty());
    }
}
