/// Ordered track identifiers with a wrapping cursor.
///
/// Built once by an external directory scan; the engine only moves the
/// cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackList {
    tracks: Vec<String>,
    current: usize,
}

impl TrackList {
    pub fn new(tracks: Vec<String>) -> Self {
        Self { tracks, current: 0 }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.tracks.get(index).map(String::as_str)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&str> {
        self.get(self.current)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(String::as_str)
    }

    /// Moves the cursor to `index`; out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        let valid = index < self.tracks.len();
        if valid {
            self.current = index;
        }
        valid
    }

    /// Index after the current one, wrapping to the first.
    pub fn next_index(&self) -> Option<usize> {
        (!self.is_empty()).then(|| (self.current + 1) % self.tracks.len())
    }

    /// Index before the current one, wrapping to the last.
    pub fn previous_index(&self) -> Option<usize> {
        (!self.is_empty()).then(|| (self.current + self.tracks.len() - 1) % self.tracks.len())
    }
}

impl From<Vec<String>> for TrackList {
    fn from(tracks: Vec<String>) -> Self {
        Self::new(tracks)
    }
}

impl<'a> FromIterator<&'a str> for TrackList {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(str::to_string).collect())
    }
}

#[test]
fn cursor_wraps_both_ways() {
    let mut list: TrackList = ["a.wav", "b.wav", "c.wav"].into_iter().collect();
    assert_eq!(list.previous_index(), Some(2));
    assert!(list.select(2));
    assert_eq!(list.next_index(), Some(0));
    assert!(!list.select(3));
    assert_eq!(list.current(), Some("c.wav"));

    let single: TrackList = ["only.wav"].into_iter().collect();
    assert_eq!(single.next_index(), Some(0));
    assert_eq!(single.previous_index(), Some(0));

    let empty = TrackList::default();
    assert_eq!(empty.next_index(), None);
    assert_eq!(empty.current(), None);
}
