use super::PieceState;
use crate::error::{BittorrentError, PieceError, Result};
use crate::torrent::{PieceHash, TorrentInfo};
use bytes::Bytes;
use tracing::{debug, info, warn};

/// One slot per piece, each empty or holding bytes that passed verification
pub struct ValidatedPieceSet {
    hashes: Vec<PieceHash>,
    lengths: Vec<u64>,
    slots: Vec<Option<Bytes>>,
}

impl ValidatedPieceSet {
    pub fn new(info: &TorrentInfo) -> Self {
        let num_pieces = info.num_pieces();
        let lengths = (0..num_pieces)
            .map(|index| info.piece_size(index).unwrap_or(0))
            .collect();

        Self {
            hashes: info.pieces.iter().copied().collect(),
            lengths,
            slots: vec![None; num_pieces],
        }
    }

    /// Verify `data` against digest `index` and keep it on success.
    ///
    /// A mismatch leaves the slot exactly as it was.
    pub fn store(&mut self, index: usize, data: Bytes) -> std::result::Result<(), PieceError> {
        let hash = self.hashes.get(index).ok_or(PieceError::OutOfRange {
            index,
            count: self.hashes.len(),
        })?;

        if !hash.matches(&data) {
            warn!("Piece {} is corrupted ({} bytes)", index, data.len());
            return Err(PieceError::DigestMismatch {
                index,
                received: data.len(),
            });
        }

        debug!("Piece {} verified ({} bytes)", index, data.len());
        self.slots[index] = Some(data);
        Ok(())
    }

    /// Expected byte length of piece `index`
    pub fn piece_len(&self, index: usize) -> Option<u64> {
        self.lengths.get(index).copied()
    }

    pub fn state(&self, index: usize) -> Option<PieceState> {
        self.slots.get(index).map(|slot| match slot {
            Some(_) => PieceState::Verified,
            None => PieceState::Missing,
        })
    }

    /// Lowest empty slot
    pub fn next_missing(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn piece_count(&self) -> usize {
        self.slots.len()
    }

    pub fn complete_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn progress(&self) -> f64 {
        if self.slots.is_empty() {
            return 100.0;
        }
        (self.complete_count() as f64 / self.piece_count() as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.complete_count() == self.piece_count()
    }

    /// Concatenate all slots in index order. Fails while any slot is empty.
    pub fn assemble(&self) -> Result<Vec<u8>> {
        if let Some(missing) = self.next_missing() {
            return Err(BittorrentError::StorageError(format!(
                "Cannot assemble file: piece {} missing",
                missing
            )));
        }

        let total: u64 = self.lengths.iter().sum();
        let mut file = Vec::with_capacity(total as usize);
        for piece in self.slots.iter().flatten() {
            file.extend_from_slice(&piece);
        }

        info!("Assembled {} bytes", file.len());
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent::Pieces;

    fn info_for(data: &[u8], piece_length: u64) -> TorrentInfo {
        let mut pieces = Pieces::default();
        for chunk in data.chunks(piece_length as usize) {
            pieces.push(PieceHash::of(chunk));
        }
        TorrentInfo {
            name: "file.bin".to_string(),
            length: data.len() as u64,
            piece_length,
            pieces,
        }
    }

    #[test]
    fn test_corrupted_piece_leaves_slot_empty() {
        let data = b"abcdefghij".to_vec();
        let mut set = ValidatedPieceSet::new(&info_for(&data, 4));

        let err = set.store(0, Bytes::from_static(b"abcX")).unwrap_err();
        assert_eq!(err, PieceError::DigestMismatch { index: 0, received: 4 });
        assert_eq!(set.state(0), Some(PieceState::Missing));
        assert_eq!(set.next_missing(), Some(0));

        set.store(0, Bytes::from_static(b"abcd")).unwrap();
        assert_eq!(set.state(0), Some(PieceState::Verified));
        assert_eq!(set.next_missing(), Some(1));
    }

    #[test]
    fn test_short_last_piece_and_assembly() {
        let data = b"abcdefghij".to_vec();
        let mut set = ValidatedPieceSet::new(&info_for(&data, 4));
        assert_eq!(set.piece_len(2), Some(2));

        set.store(0, Bytes::from_static(b"abcd")).unwrap();
        set.store(1, Bytes::from_static(b"efgh")).unwrap();
        // a padded final window does not verify
        assert!(set.store(2, Bytes::from_static(b"ij\0\0")).is_err());
        set.store(2, Bytes::from_static(b"ij")).unwrap();

        assert!(set.is_complete());
        assert_eq!(set.assemble().unwrap(), data);
    }

    #[test]
    fn test_incomplete_set_does_not_assemble() {
        let data = b"abcdefgh".to_vec();
        let mut set = ValidatedPieceSet::new(&info_for(&data, 4));
        set.store(1, Bytes::from_static(b"efgh")).unwrap();
        assert_eq!(set.progress(), 50.0);
        assert!(set.assemble().is_err());
    }

    #[test]
    fn test_out_of_range() {
        let mut set = ValidatedPieceSet::new(&info_for(b"abcd", 4));
        assert_eq!(
            set.store(5, Bytes::new()),
            Err(PieceError::OutOfRange { index: 5, count: 1 })
        );
    }

    #[test]
    fn test_empty_file_is_complete() {
        let set = ValidatedPieceSet::new(&info_for(b"", 4));
        assert!(set.is_complete());
        assert_eq!(set.assemble().unwrap(), Vec::<u8>::new());
    }
}
