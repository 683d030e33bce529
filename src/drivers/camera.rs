//! OV2640 camera driver (esp32-camera component).
//!
//! Implements [`CameraPort`].  On ESP-IDF every [`Frame`] wraps a driver
//! frame buffer (`camera_fb_t`) that must be handed back through
//! `esp_camera_fb_return`; the domain only ever sees frames through a
//! [`FrameLease`](crate::app::ports::FrameLease), which does that on drop.
//!
//! ## Frame geometry
//!
//! | PSRAM | frame size | JPEG quality | buffers |
//! |-------|------------|--------------|---------|
//! | yes   | SVGA       | 10           | 2       |
//! | no    | VGA        | 12           | 1       |
//!
//! ## Dual-target design
//!
//! On host/test the driver synthesises JPEG-shaped buffers whose size can
//! be scripted, which is enough to drive the size-delta motion detector.

use log::info;

use crate::app::ports::{CameraError, CameraPort};

/// Requested frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// 640x480
    Vga,
    /// 800x600
    Svga,
}

/// Sensor / buffer configuration chosen at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSetup {
    pub frame_size: FrameSize,
    pub jpeg_quality: u8,
    pub fb_count: u8,
}

impl CameraSetup {
    /// Larger frames and double buffering only when PSRAM is present.
    pub fn for_psram(has_psram: bool) -> Self {
        if has_psram {
            Self {
                frame_size: FrameSize::Svga,
                jpeg_quality: 10,
                fb_count: 2,
            }
        } else {
            Self {
                frame_size: FrameSize::Vga,
                jpeg_quality: 12,
                fb_count: 1,
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::sys::{self, camera};

    use super::{CameraSetup, FrameSize};
    use crate::pins;

    /// One driver-owned frame buffer.
    pub struct Frame {
        fb: *mut camera::camera_fb_t,
    }

    impl AsRef<[u8]> for Frame {
        fn as_ref(&self) -> &[u8] {
            // SAFETY: `fb` is non-null (checked in `get`) and stays valid
            // until `esp_camera_fb_return`, which consumes the Frame.  The
            // struct is packed on some IDF versions, so read unaligned.
            unsafe {
                let buf = core::ptr::addr_of!((*self.fb).buf).read_unaligned();
                let len = core::ptr::addr_of!((*self.fb).len).read_unaligned();
                if buf.is_null() {
                    return &[];
                }
                core::slice::from_raw_parts(buf, len)
            }
        }
    }

    pub fn has_psram() -> bool {
        unsafe { sys::heap_caps_get_total_size(sys::MALLOC_CAP_SPIRAM) > 0 }
    }

    pub fn init(setup: &CameraSetup) -> Result<(), i32> {
        let d = pins::CAM_DATA_GPIO;
        let mut config = camera::camera_config_t {
            pin_pwdn: pins::CAM_PWDN_GPIO,
            pin_reset: pins::CAM_RESET_GPIO,
            pin_xclk: pins::CAM_XCLK_GPIO,
            pin_d0: d[0],
            pin_d1: d[1],
            pin_d2: d[2],
            pin_d3: d[3],
            pin_d4: d[4],
            pin_d5: d[5],
            pin_d6: d[6],
            pin_d7: d[7],
            pin_vsync: pins::CAM_VSYNC_GPIO,
            pin_href: pins::CAM_HREF_GPIO,
            pin_pclk: pins::CAM_PCLK_GPIO,
            xclk_freq_hz: pins::CAM_XCLK_FREQ_HZ,
            ledc_timer: sys::ledc_timer_t_LEDC_TIMER_0,
            ledc_channel: sys::ledc_channel_t_LEDC_CHANNEL_0,
            pixel_format: camera::pixformat_t_PIXFORMAT_JPEG,
            frame_size: match setup.frame_size {
                FrameSize::Vga => camera::framesize_t_FRAMESIZE_VGA,
                FrameSize::Svga => camera::framesize_t_FRAMESIZE_SVGA,
            },
            jpeg_quality: i32::from(setup.jpeg_quality),
            fb_count: usize::from(setup.fb_count),
            fb_location: if setup.fb_count > 1 {
                camera::camera_fb_location_t_CAMERA_FB_IN_PSRAM
            } else {
                camera::camera_fb_location_t_CAMERA_FB_IN_DRAM
            },
            grab_mode: camera::camera_grab_mode_t_CAMERA_GRAB_LATEST,
            ..Default::default()
        };
        config.__bindgen_anon_1.pin_sccb_sda = pins::CAM_SIOD_GPIO;
        config.__bindgen_anon_2.pin_sccb_scl = pins::CAM_SIOC_GPIO;

        // SAFETY: config outlives the call; the driver copies what it keeps.
        let ret = unsafe { camera::esp_camera_init(&config) };
        if ret == sys::ESP_OK as sys::esp_err_t {
            Ok(())
        } else {
            Err(ret)
        }
    }

    pub fn get() -> Option<Frame> {
        // SAFETY: the driver is initialised before any CameraDriver exists.
        let fb = unsafe { camera::esp_camera_fb_get() };
        (!fb.is_null()).then_some(Frame { fb })
    }

    pub fn release(frame: Frame) {
        // SAFETY: `frame.fb` came from esp_camera_fb_get and is returned once.
        unsafe { camera::esp_camera_fb_return(frame.fb) };
    }
}

#[cfg(target_os = "espidf")]
pub use esp::Frame;

/// Host builds hand out owned buffers.
#[cfg(not(target_os = "espidf"))]
pub type Frame = Vec<u8>;

// ───────────────────────────────────────────────────────────────
// Driver
// ───────────────────────────────────────────────────────────────

/// Base size of a simulated frame, roughly a quiet VGA scene.
#[cfg(not(target_os = "espidf"))]
const SIM_FRAME_LEN: usize = 18_000;

pub struct CameraDriver {
    setup: CameraSetup,
    outstanding: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_script: std::collections::VecDeque<Option<usize>>,
    #[cfg(not(target_os = "espidf"))]
    sim_counter: u32,
}

impl CameraDriver {
    /// Initialise the sensor.  Fails if `esp_camera_init` does.
    #[cfg(target_os = "espidf")]
    pub fn init() -> Result<Self, CameraError> {
        let setup = CameraSetup::for_psram(esp::has_psram());
        esp::init(&setup).map_err(CameraError::InitFailed)?;
        info!("Camera initialised ({:?})", setup);
        Ok(Self {
            setup,
            outstanding: 0,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn init() -> Result<Self, CameraError> {
        let setup = CameraSetup::for_psram(false);
        info!("Camera(sim): initialised ({:?})", setup);
        Ok(Self {
            setup,
            outstanding: 0,
            sim_script: std::collections::VecDeque::new(),
            sim_counter: 0,
        })
    }

    pub fn setup(&self) -> CameraSetup {
        self.setup
    }

    /// Frames handed out and not yet returned.
    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    /// Simulation only: queue the size of upcoming frames (`None` = the
    /// driver returns no frame).  Unscripted frames hover around a fixed
    /// size.
    #[cfg(not(target_os = "espidf"))]
    pub fn script(&mut self, sizes: impl IntoIterator<Item = Option<usize>>) {
        self.sim_script.extend(sizes);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_frame(&mut self) -> Option<Frame> {
        self.sim_counter = self.sim_counter.wrapping_add(1);
        let len = match self.sim_script.pop_front() {
            Some(scripted) => scripted?,
            // Small jitter, well under any valid motion threshold.
            None => SIM_FRAME_LEN + (self.sim_counter % 7) as usize * 40,
        };
        let mut frame = vec![0u8; len.max(4)];
        frame[0] = 0xFF;
        frame[1] = 0xD8;
        let end = frame.len();
        frame[end - 2] = 0xFF;
        frame[end - 1] = 0xD9;
        Some(frame)
    }
}

impl CameraPort for CameraDriver {
    type Frame = Frame;

    fn acquire_frame(&mut self) -> Option<Frame> {
        #[cfg(target_os = "espidf")]
        let frame = esp::get();
        #[cfg(not(target_os = "espidf"))]
        let frame = self.sim_frame();

        if frame.is_some() {
            self.outstanding += 1;
        } else {
            log::warn!("Camera: no frame");
        }
        frame
    }

    fn release_frame(&mut self, frame: Frame) {
        self.outstanding = self.outstanding.saturating_sub(1);
        #[cfg(target_os = "espidf")]
        esp::release(frame);
        #[cfg(not(target_os = "espidf"))]
        drop(frame);
    }
}
