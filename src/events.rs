/// Outcome of showing one photo: the interval ran out or a key was struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    Next,
    Back,
    Reshuffle,
    /// Check the remote folder and settings right away.
    New,
    Exit,
}

impl NavigationEvent {
    /// Map one line of keyboard input. Anything unrecognised advances.
    pub fn from_key(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "q" | "x" | "exit" | "\u{1b}" => NavigationEvent::Exit,
            "b" | "back" => NavigationEvent::Back,
            "r" | "reshuffle" => NavigationEvent::Reshuffle,
            "n" | "new" => NavigationEvent::New,
            _ => NavigationEvent::Next,
        }
    }
}

/// Lifecycle of the slideshow loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Running,
    /// A sync and settings check is due before the next photo.
    AwaitingRefresh,
    /// Connectivity lost; showing the existing order without polling.
    Offline,
    Exited,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_navigation() {
        assert_eq!(NavigationEvent::from_key("b\n"), NavigationEvent::Back);
        assert_eq!(NavigationEvent::from_key("R"), NavigationEvent::Reshuffle);
        assert_eq!(NavigationEvent::from_key("n"), NavigationEvent::New);
        assert_eq!(NavigationEvent::from_key("\u{1b}"), NavigationEvent::Exit);
        assert_eq!(NavigationEvent::from_key(""), NavigationEvent::Next);
        assert_eq!(NavigationEvent::from_key("space"), NavigationEvent::Next);
    }
}
