use std::sync::Arc;

use nokhwa::{native_api_backend, query, utils::CameraInfo};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    camera_adapter::{adapter_for_vid_pid, CameraAdapter},
    errors::{CaptureError, Result},
};

//
// A video device together with its USB VID:PID and the adapter that knows
// how to handle it, when there is one.
//
#[derive(Clone)]
pub struct EnumeratedCamera {
    pub index: Option<u32>,
    pub name: String,
    pub description: String,
    pub usb_vid_pid: Option<(u16, u16)>,
    pub adapter: Option<Arc<dyn CameraAdapter>>,
}

impl EnumeratedCamera {
    fn from_info(info: &CameraInfo) -> Self {
        let description = info.description().to_string();
        let usb_vid_pid = vid_pid_from_description(&description);
        Self {
            index: info.index().as_index().ok(),
            name: info.human_name(),
            description,
            usb_vid_pid,
            adapter: usb_vid_pid.and_then(|(vid, pid)| adapter_for_vid_pid(vid, pid)),
        }
    }

    pub fn display_name(&self) -> String {
        let mut name = match self.index {
            Some(index) => format!("[{}] {}", index, self.name),
            None => self.name.clone(),
        };
        if let Some(adapter) = &self.adapter {
            name.push_str(&format!(" ({})", adapter.name()));
        }
        if let Some((vid, pid)) = self.usb_vid_pid {
            name.push_str(&format!(" [USB {:04x}:{:04x}]", vid, pid));
        }
        name
    }
}

impl std::fmt::Debug for EnumeratedCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumeratedCamera")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("usb_vid_pid", &self.usb_vid_pid)
            .field("adapter", &self.adapter.as_ref().map(|a| a.short_name()))
            .finish()
    }
}

pub fn enumerate_cameras() -> Result<Vec<EnumeratedCamera>> {
    let backend = native_api_backend().ok_or_else(|| CaptureError::DeviceUnavailable {
        index: 0,
        reason: "no native camera backend on this platform".to_string(),
    })?;

    let cameras = query(backend).map_err(|err| CaptureError::DeviceUnavailable {
        index: 0,
        reason: format!("failed to query cameras: {}", err),
    })?;

    Ok(cameras.iter().map(EnumeratedCamera::from_info).collect())
}

static DEV_VIDEO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/dev/video(\d+)").expect("valid regex"));

static UEVENT_PRODUCT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PRODUCT=([0-9a-fA-F]+)/([0-9a-fA-F]+)/(\w+)").expect("valid regex"));

//
// V4L2 descriptions carry the /dev/videoN node, whose sysfs uevent names
// the USB product.
//
#[cfg(target_os = "linux")]
fn vid_pid_from_description(description: &str) -> Option<(u16, u16)> {
    let dev_num: u32 = DEV_VIDEO_REGEX
        .captures(description)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    let uevent_path = format!("/sys/class/video4linux/video{}/device/uevent", dev_num);
    let uevent = std::fs::read_to_string(uevent_path).ok()?;
    parse_uevent_product(&uevent)
}

#[cfg(not(target_os = "linux"))]
fn vid_pid_from_description(_description: &str) -> Option<(u16, u16)> {
    None
}

fn parse_uevent_product(uevent: &str) -> Option<(u16, u16)> {
    let captures = UEVENT_PRODUCT_REGEX.captures(uevent)?;
    let vid = u16::from_str_radix(captures.get(1)?.as_str(), 16).ok()?;
    let pid = u16::from_str_radix(captures.get(2)?.as_str(), 16).ok()?;
    Some((vid, pid))
}
