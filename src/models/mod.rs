mod exercise;

pub use exercise::{ExerciseNameRecord, Mutation, MutationOutcome, PendingAction, SyncMeta};
