//! Bidirectional position mapping between preprocessed and original source
//! (spec §4.2 "Code-Map").
//!
//! The preprocessor emits text that no longer matches the files the user
//! wrote: `#include` splices other files in, `#define` rewrites tokens in
//! place, conditionals delete whole ranges. A [`CodeMap`] remembers, for
//! every byte range of the preprocessed output, where it came from in the
//! original source, so that parse/assemble errors (which only see
//! preprocessed text) can be reported against what the user actually
//! wrote. It is built up through a small set of edit operations
//! (`replace_characters`, `insert_file_contents`) rather than by the
//! preprocessor constructing `Segment`s by hand.

use std::cmp::Ordering;

/// Where one contiguous range of preprocessed text came from.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SegmentKind {
    /// Copied verbatim from the current file at the paired offset.
    Direct,
    /// Produced by macro expansion; traced back to the invocation site
    /// rather than the macro body.
    Replaced,
    /// Spliced in from a different file by `#include`.
    External { file: String },
}

/// One contiguous range `[start, end)` of preprocessed output and the
/// corresponding position it maps back to.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub kind: SegmentKind,
    /// Offset in the original (or included) file that `start` corresponds
    /// to. Offsets within the segment are `original_offset + (pos - start)`.
    pub original_offset: usize,
}

impl Segment {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn shifted(&self, delta: isize) -> Segment {
        Segment {
            start: (self.start as isize + delta) as usize,
            end: (self.end as isize + delta) as usize,
            kind: self.kind.clone(),
            original_offset: self.original_offset,
        }
    }
}

/// Ordered, non-overlapping segments covering `0..len(preprocessed text)`.
#[derive(Clone, Debug, Default)]
pub struct CodeMap {
    segments: Vec<Segment>,
}

/// The result of mapping a preprocessed-text offset back to its origin.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum OriginalPosition {
    /// The offset maps into the file being assembled.
    SameFile { offset: usize },
    /// The offset maps into a file spliced in by `#include`.
    OtherFile { file: String, offset: usize },
}

impl CodeMap {
    pub fn new() -> CodeMap {
        CodeMap::default()
    }

    /// Seeds a map for a standalone source string of length `len`: one
    /// covering `Direct` segment over `0..len`, the identity mapping
    /// before any edit has happened.
    pub fn new_for_source(len: usize) -> CodeMap {
        let mut map = CodeMap::default();
        if len > 0 {
            map.segments.push(Segment {
                start: 0,
                end: len,
                kind: SegmentKind::Direct,
                original_offset: 0,
            });
        }
        map
    }

    /// Appends a segment. Segments must be pushed in increasing `start`
    /// order; this is an invariant of how callers build a map up in a
    /// single forward pass and is not re-validated here to keep emission
    /// cheap.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    fn segment_index_containing(&self, at: usize) -> Option<usize> {
        self.segments
            .binary_search_by(|segment| {
                if at < segment.start {
                    Ordering::Greater
                } else if at >= segment.end {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()
    }

    /// Splits whichever segment covers `at` into two segments meeting at
    /// `at`. A no-op if `at` already falls on a segment boundary (or
    /// outside every segment). [`CodeMap::replace_characters`] calls this
    /// on both edges of the range it's replacing so the edit only ever
    /// touches whole segments.
    pub fn split_segment(&mut self, at: usize) {
        let Some(index) = self.segment_index_containing(at) else {
            return;
        };
        let segment = self.segments[index].clone();
        if at == segment.start || at == segment.end {
            return;
        }
        let first = Segment {
            start: segment.start,
            end: at,
            kind: segment.kind.clone(),
            original_offset: segment.original_offset,
        };
        let second = Segment {
            start: at,
            end: segment.end,
            kind: segment.kind,
            original_offset: segment.original_offset + (at - first.start),
        };
        self.segments.splice(index..=index, [first, second]);
    }

    /// Replaces the preprocessed text in `[start, end)` with `new_len`
    /// characters of `kind`, tracing back to `origin_offset`, and shifts
    /// every later segment by the resulting length delta. A zero-width
    /// range (`start == end`) is a pure insertion.
    pub fn replace_characters(
        &mut self,
        start: usize,
        end: usize,
        new_len: usize,
        kind: SegmentKind,
        origin_offset: usize,
    ) {
        self.split_segment(start);
        self.split_segment(end);

        self.segments.retain(|s| s.end <= start || s.start >= end);
        let insert_at = self.segments.partition_point(|s| s.start < start);

        let delta = new_len as isize - (end - start) as isize;
        for segment in self.segments[insert_at..].iter_mut() {
            *segment = segment.shifted(delta);
        }

        if new_len > 0 {
            self.segments.insert(
                insert_at,
                Segment {
                    start,
                    end: start + new_len,
                    kind,
                    original_offset,
                },
            );
        }
    }

    /// Splices `len` characters of another file's contents in at `at`,
    /// tagging the new range `External { file }`. A convenience over
    /// [`CodeMap::replace_characters`] for the `#include` case, where the
    /// mapped-from range is always the start of the included file.
    pub fn insert_file_contents(&mut self, at: usize, len: usize, file: String) {
        self.replace_characters(at, at, len, SegmentKind::External { file }, 0);
    }

    /// Maps a position in preprocessed text back to where it came from.
    /// Returns `None` if `offset` falls outside any recorded segment (a
    /// bug in the preprocessor, since every emitted byte should be
    /// covered).
    pub fn convert_to_original(&self, offset: usize) -> Option<OriginalPosition> {
        let index = self.segment_index_containing(offset)?;
        let segment = &self.segments[index];
        let original_offset = segment.original_offset + (offset - segment.start);
        Some(match &segment.kind {
            SegmentKind::Direct | SegmentKind::Replaced => {
                OriginalPosition::SameFile { offset: original_offset }
            }
            SegmentKind::External { file } => OriginalPosition::OtherFile {
                file: file.clone(),
                offset: original_offset,
            },
        })
    }

    /// The inverse of [`CodeMap::convert_to_original`]: given a position
    /// in the original (or an included file's) source, finds the
    /// preprocessed-text offset it currently maps to. Only `Direct`
    /// segments are guaranteed to round-trip (spec §8's "Code-Map
    /// bijection on direct segments" property) — text that was rewritten
    /// or dropped by a macro/conditional has no single preprocessed
    /// position to return, so this only ever searches `Direct` segments.
    pub fn convert_to_modified(&self, position: &OriginalPosition) -> Option<usize> {
        match position {
            OriginalPosition::SameFile { offset } => self.segments.iter().find_map(|segment| {
                if !matches!(segment.kind, SegmentKind::Direct) {
                    return None;
                }
                let span = segment.original_offset..segment.original_offset + segment.len();
                span.contains(offset)
                    .then(|| segment.start + (offset - segment.original_offset))
            }),
            OriginalPosition::OtherFile { file, offset } => self.segments.iter().find_map(|segment| {
                match &segment.kind {
                    SegmentKind::External { file: f } if f == file => {
                        let span = segment.original_offset..segment.original_offset + segment.len();
                        span.contains(offset)
                            .then(|| segment.start + (offset - segment.original_offset))
                    }
                    _ => None,
                }
            }),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_a_direct_segment() {
        let mut map = CodeMap::new();
        map.push(Segment {
            start: 0,
            end: 10,
            kind: SegmentKind::Direct,
            original_offset: 0,
        });
        assert_eq!(
            map.convert_to_original(4),
            Some(OriginalPosition::SameFile { offset: 4 })
        );
    }

    #[test]
    fn maps_an_included_file_segment() {
        let mut map = CodeMap::new();
        map.push(Segment {
            start: 0,
            end: 5,
            kind: SegmentKind::Direct,
            original_offset: 0,
        });
        map.push(Segment {
            start: 5,
            end: 20,
            kind: SegmentKind::External {
                file: "macros.s".to_string(),
            },
            original_offset: 0,
        });
        assert_eq!(
            map.convert_to_original(8),
            Some(OriginalPosition::OtherFile {
                file: "macros.s".to_string(),
                offset: 3,
            })
        );
    }

    #[test]
    fn offset_outside_all_segments_is_none() {
        let map = CodeMap::new();
        assert_eq!(map.convert_to_original(0), None);
    }

    #[test]
    fn new_for_source_seeds_one_covering_direct_segment() {
        let map = CodeMap::new_for_source(12);
        assert_eq!(map.segments().len(), 1);
        assert_eq!(
            map.convert_to_original(7),
            Some(OriginalPosition::SameFile { offset: 7 })
        );
    }

    #[test]
    fn convert_to_modified_is_the_inverse_of_convert_to_original_on_direct_segments() {
        let map = CodeMap::new_for_source(20);
        for offset in 0..20 {
            let original = map.convert_to_original(offset).unwrap();
            assert_eq!(map.convert_to_modified(&original), Some(offset));
        }
    }

    #[test]
    fn replace_characters_splices_in_the_middle_and_shifts_the_tail() {
        let mut map = CodeMap::new_for_source(10);
        // Replace offsets [2, 4) (2 chars) with 5 chars of macro expansion.
        map.replace_characters(2, 4, 5, SegmentKind::Replaced, 2);
        assert_eq!(
            map.convert_to_original(0),
            Some(OriginalPosition::SameFile { offset: 0 })
        );
        assert_eq!(
            map.convert_to_original(3),
            Some(OriginalPosition::SameFile { offset: 3 })
        );
        // Tail that used to start at 4 now starts at 4 + (5 - 2) = 7, and
        // still maps back to original offset 4.
        assert_eq!(
            map.convert_to_original(7),
            Some(OriginalPosition::SameFile { offset: 4 })
        );
    }

    #[test]
    fn insert_file_contents_tags_the_spliced_range_as_external() {
        let mut map = CodeMap::new();
        map.insert_file_contents(0, 6, "lib.s".to_string());
        assert_eq!(
            map.convert_to_original(2),
            Some(OriginalPosition::OtherFile { file: "lib.s".to_string(), offset: 2 })
        );
    }

    #[test]
    fn split_segment_is_a_no_op_on_an_existing_boundary() {
        let mut map = CodeMap::new_for_source(10);
        map.split_segment(0);
        map.split_segment(10);
        assert_eq!(map.segments().len(), 1);
    }
}
