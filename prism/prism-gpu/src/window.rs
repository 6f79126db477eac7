//! What the GPU layer needs from a window: its platform kind and raw handles.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Win32,
    Xlib,
    Xcb,
    Wayland,
    AppKit,
    UiKit,
    Android,
    /// No native window; presentation is impossible.
    Headless,
}

impl WindowType {
    /// Derives the platform kind from a raw window handle.
    pub fn from_raw(handle: &RawWindowHandle) -> Self {
        match handle {
            RawWindowHandle::Win32(_) => WindowType::Win32,
            RawWindowHandle::Xlib(_) => WindowType::Xlib,
            RawWindowHandle::Xcb(_) => WindowType::Xcb,
            RawWindowHandle::Wayland(_) => WindowType::Wayland,
            RawWindowHandle::AppKit(_) => WindowType::AppKit,
            RawWindowHandle::UiKit(_) => WindowType::UiKit,
            RawWindowHandle::AndroidNdk(_) => WindowType::Android,
            _ => WindowType::Headless,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

/// Window collaborator. The GPU layer never calls into input or event APIs.
pub trait Window {
    /// Defaults to the platform of the raw window handle.
    fn get_window_type(&self) -> WindowType {
        WindowType::from_raw(&self.get_raw_handle().window)
    }

    fn get_raw_handle(&self) -> RawHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WebWindowHandle, XlibDisplayHandle, XlibWindowHandle};

    struct XlibWindow;

    impl Window for XlibWindow {
        fn get_raw_handle(&self) -> RawHandle {
            RawHandle {
                display: RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
                window: RawWindowHandle::Xlib(XlibWindowHandle::new(7)),
            }
        }
    }

    #[test]
    fn window_type_follows_raw_handle() {
        assert_eq!(XlibWindow.get_window_type(), WindowType::Xlib);
        assert_eq!(
            WindowType::from_raw(&RawWindowHandle::Web(WebWindowHandle::new(1))),
            WindowType::Headless
        );
    }
}
