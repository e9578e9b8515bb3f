/// Entries accumulated before a batch is pushed to the receiver.
pub(crate) const BATCH_SIZE: usize = 128;
