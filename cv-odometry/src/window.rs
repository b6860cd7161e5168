/// How many frames are buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// No frame seen yet.
    Empty,
    /// One frame buffered; nothing to compare it against.
    Warming,
    /// An old and a new frame are buffered.
    Tracking,
}

/// A ring buffer holding the two most recent frames.
///
/// Pushing into a full window evicts the old frame, the previous new frame becomes
/// the old one, and the pushed frame becomes the new one.
#[derive(Debug, Clone)]
pub struct FrameWindow<T> {
    slots: [Option<T>; 2],
    /// Index of the newest frame.
    head: usize,
}

impl<T> Default for FrameWindow<T> {
    fn default() -> Self {
        Self {
            slots: [None, None],
            head: 1,
        }
    }
}

impl<T> FrameWindow<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shifts the window and returns the evicted frame, if any.
    pub fn push(&mut self, frame: T) -> Option<T> {
        self.head = 1 - self.head;
        self.slots[self.head].replace(frame)
    }

    pub fn new_frame(&self) -> Option<&T> {
        self.slots[self.head].as_ref()
    }

    pub fn old_frame(&self) -> Option<&T> {
        self.slots[1 - self.head].as_ref()
    }

    /// Both frames, oldest first, once the window is full.
    pub fn pair(&self) -> Option<(&T, &T)> {
        Some((self.old_frame()?, self.new_frame()?))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> WindowState {
        match self.len() {
            0 => WindowState::Empty,
            1 => WindowState::Warming,
            _ => WindowState::Tracking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_then_shifts() {
        let mut window = FrameWindow::new();
        assert_eq!(window.state(), WindowState::Empty);
        assert_eq!(window.pair(), None);

        assert_eq!(window.push(1), None);
        assert_eq!(window.state(), WindowState::Warming);
        assert_eq!(window.new_frame(), Some(&1));
        assert_eq!(window.old_frame(), None);

        assert_eq!(window.push(2), None);
        assert_eq!(window.state(), WindowState::Tracking);
        assert_eq!(window.pair(), Some((&1, &2)));

        assert_eq!(window.push(3), Some(1));
        assert_eq!(window.pair(), Some((&2, &3)));
        assert_eq!(window.push(4), Some(2));
        assert_eq!(window.pair(), Some((&3, &4)));
        assert_eq!(window.len(), 2);
    }
}
