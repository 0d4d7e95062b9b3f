//! Blob creation flows: building a fresh snapshot from a live runtime
//! instance, and warming up an existing blob by re-serializing it after a
//! script run.

use crate::blob::SnapshotBlob;
use crate::error::Result;
use crate::types::{FunctionCodeHandling, SerializedImage, SnapshotOptions};

/// One runtime instance in the process of being serialized.
///
/// The scripting engine and object-graph encoder behind it are external
/// collaborators; this trait is the seam they plug into.
pub trait SnapshotCreator {
    type Context;

    /// Create a fresh context in this instance.
    fn create_context(&mut self) -> Self::Context;

    /// Compile and run `source` in `context`'s top-level scope. Returning
    /// `false` aborts the calling flow.
    fn run_script(&mut self, context: &mut Self::Context, source: &str, name: &str) -> bool;

    /// Hint that a context created from this instance has been discarded.
    fn context_disposed(&mut self) {}

    /// Select the context to be serialized as context 0.
    fn set_default_context(&mut self, context: Self::Context);

    /// Encode the instance plus its default context into segments.
    fn serialize(&mut self, handling: FunctionCodeHandling) -> SerializedImage;
}

/// Allocates runtime instances for the creation flows.
pub trait RuntimeHost {
    type Creator: SnapshotCreator;

    /// A fresh, empty instance.
    fn allocate(&self) -> Self::Creator;

    /// An instance cold-booted from an existing blob.
    fn from_snapshot(&self, blob: &SnapshotBlob) -> Result<Self::Creator>;
}

/// Build a snapshot blob from scratch, optionally running `embedded_source`
/// first so its definitions are captured in the default context.
///
/// A fresh instance is allocated when `creator` is `None`. Script failure
/// yields `Ok(None)` rather than an error: the caller supplied the failing
/// source and may fix and retry.
pub fn create_snapshot_blob<H: RuntimeHost>(
    host: &H,
    creator: Option<H::Creator>,
    embedded_source: Option<&str>,
    handling: FunctionCodeHandling,
    options: &SnapshotOptions,
) -> Result<Option<SnapshotBlob>> {
    let mut creator = match creator {
        Some(creator) => creator,
        None => host.allocate(),
    };

    let mut context = creator.create_context();
    if let Some(source) = embedded_source {
        if !creator.run_script(&mut context, source, "<embedded>") {
            return Ok(None);
        }
    }
    creator.set_default_context(context);

    let image = creator.serialize(handling);
    let blob = SnapshotBlob::create(
        &image.startup,
        &image.read_only,
        &image.contexts,
        image.can_be_rehashed,
        options,
    )?;
    Ok(Some(blob))
}

/// Re-serialize an existing blob after running `warmup_source` once.
///
/// The warm-up run populates the instance's compiled-code caches; serializing
/// with [`FunctionCodeHandling::Keep`] retains those artifacts. The context
/// the script ran in is polluted by its side effects and is discarded; a
/// second, untouched context is serialized in its place.
pub fn warm_up_snapshot_blob<H: RuntimeHost>(
    host: &H,
    cold_snapshot_blob: &SnapshotBlob,
    warmup_source: &str,
    options: &SnapshotOptions,
) -> Result<Option<SnapshotBlob>> {
    let mut creator = host.from_snapshot(cold_snapshot_blob)?;

    {
        let mut context = creator.create_context();
        if !creator.run_script(&mut context, warmup_source, "<warm-up>") {
            return Ok(None);
        }
    }
    creator.context_disposed();

    let context = creator.create_context();
    creator.set_default_context(context);

    let image = creator.serialize(FunctionCodeHandling::Keep);
    let blob = SnapshotBlob::create(
        &image.startup,
        &image.read_only,
        &image.contexts,
        image.can_be_rehashed,
        options,
    )?;
    Ok(Some(blob))
}
