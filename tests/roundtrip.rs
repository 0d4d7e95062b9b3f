use rand::{Rng, SeedableRng};
use snapshot_blob::{
    context_offset_field, maybe_decompress, startup_snapshot_offset, Compression,
    FIRST_CONTEXT_OFFSET_OFFSET, READ_ONLY_OFFSET_OFFSET, Reservation, SegmentData, SnapshotBlob,
    SnapshotOptions,
};

fn options(compression: Compression) -> SnapshotOptions {
    SnapshotOptions {
        compression,
        ..SnapshotOptions::default()
    }
}

fn header_u32(blob: &SnapshotBlob, offset: usize) -> u32 {
    let bytes = &blob.as_bytes()[offset..offset + 4];
    u32::from_le_bytes(bytes.try_into().unwrap())
}

#[test]
fn scenario_two_contexts_uncompressed() {
    let opts = options(Compression::None);
    let blob = SnapshotBlob::create(
        &SegmentData::new(b"S1".to_vec()),
        &SegmentData::new(b"RO1".to_vec()),
        &[
            SegmentData::new(b"C0AAA".to_vec()),
            SegmentData::new(b"C1B".to_vec()),
        ],
        true,
        &opts,
    )
    .unwrap();

    assert_eq!(blob.num_contexts().unwrap(), 2);
    assert!(blob.rehashability().unwrap());
    assert_eq!(blob.extract_startup_data().unwrap(), b"S1");
    assert_eq!(blob.extract_read_only_data().unwrap(), b"RO1");
    assert_eq!(blob.extract_context_data(0).unwrap(), b"C0AAA");
    assert_eq!(blob.extract_context_data(1).unwrap(), b"C1B");

    assert!(blob.has_context_snapshot(0));
    assert!(blob.has_context_snapshot(1));
    assert!(!blob.has_context_snapshot(2));

    assert!(blob.verify_checksum(&opts).unwrap());
    blob.check_version(&opts.version).unwrap();
}

#[test]
fn scenario_two_contexts_lz4() {
    let opts = options(Compression::Lz4);
    let contexts = [
        SegmentData::new(b"C0AAA".to_vec()),
        SegmentData::new(b"C1B".to_vec()),
    ];
    let blob = SnapshotBlob::create(
        &SegmentData::new(b"S1".to_vec()),
        &SegmentData::new(b"RO1".to_vec()),
        &contexts,
        true,
        &opts,
    )
    .unwrap();

    let startup = maybe_decompress(blob.extract_startup_data().unwrap(), opts.compression).unwrap();
    assert_eq!(&*startup, b"S1");
    let read_only =
        maybe_decompress(blob.extract_read_only_data().unwrap(), opts.compression).unwrap();
    assert_eq!(&*read_only, b"RO1");
    for (index, context) in contexts.iter().enumerate() {
        let bytes =
            maybe_decompress(blob.extract_context_data(index as u32).unwrap(), opts.compression)
                .unwrap();
        assert_eq!(&*bytes, &context.bytes[..]);
    }
}

#[test]
fn segment_offsets_are_strictly_increasing() {
    let blob = SnapshotBlob::create(
        &SegmentData::new(vec![1; 10]),
        &SegmentData::new(vec![2; 20]),
        &[
            SegmentData::new(vec![3; 5]),
            SegmentData::new(vec![4; 7]),
            SegmentData::new(vec![5; 1]),
        ],
        false,
        &options(Compression::None),
    )
    .unwrap();

    let num_contexts = blob.num_contexts().unwrap();
    let startup_offset = startup_snapshot_offset(num_contexts);
    let read_only_offset = u64::from(header_u32(&blob, READ_ONLY_OFFSET_OFFSET));
    let mut offsets = vec![startup_offset, read_only_offset];
    for index in 0..num_contexts {
        offsets.push(u64::from(header_u32(&blob, context_offset_field(index))));
    }
    offsets.push(blob.raw_size() as u64);

    for pair in offsets.windows(2) {
        assert!(pair[0] < pair[1], "offsets not strictly increasing: {offsets:?}");
    }
}

#[test]
fn zero_contexts_read_only_extends_to_end_of_blob() {
    let opts = options(Compression::None);
    let blob = SnapshotBlob::create(
        &SegmentData::new(b"startup".to_vec()),
        &SegmentData::new(b"read-only".to_vec()),
        &[],
        false,
        &opts,
    )
    .unwrap();

    assert_eq!(blob.num_contexts().unwrap(), 0);
    assert_eq!(blob.extract_startup_data().unwrap(), b"startup");
    assert_eq!(blob.extract_read_only_data().unwrap(), b"read-only");
    assert!(!blob.has_context_snapshot(0));
    assert!(blob.extract_context_data(0).is_err());

    // With no context offset array the header ends at the fixed fields.
    assert_eq!(
        startup_snapshot_offset(0) % std::mem::size_of::<usize>() as u64,
        0
    );
    assert!(startup_snapshot_offset(0) >= FIRST_CONTEXT_OFFSET_OFFSET as u64);
}

#[test]
fn random_segments_round_trip_both_compressions() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    for compression in [Compression::None, Compression::Lz4] {
        let opts = options(compression);
        for _ in 0..8 {
            let gen_segment = |rng: &mut rand::rngs::StdRng| {
                let len = rng.gen_range(1..2048);
                let mut bytes = vec![0u8; len];
                rng.fill(&mut bytes[..]);
                SegmentData::with_reservations(
                    bytes,
                    vec![Reservation {
                        chunk_size: rng.gen_range(0..1 << 20),
                    }],
                )
            };
            let startup = gen_segment(&mut rng);
            let read_only = gen_segment(&mut rng);
            let num_contexts = rng.gen_range(0..4);
            let contexts: Vec<SegmentData> = (0..num_contexts).map(|_| gen_segment(&mut rng)).collect();
            let rehash = rng.gen_bool(0.5);

            let blob =
                SnapshotBlob::create(&startup, &read_only, &contexts, rehash, &opts).unwrap();

            assert_eq!(blob.num_contexts().unwrap(), num_contexts);
            assert_eq!(blob.rehashability().unwrap(), rehash);
            assert!(blob.verify_checksum(&opts).unwrap());
            assert_eq!(
                &*maybe_decompress(blob.extract_startup_data().unwrap(), compression).unwrap(),
                &startup.bytes[..]
            );
            assert_eq!(
                &*maybe_decompress(blob.extract_read_only_data().unwrap(), compression).unwrap(),
                &read_only.bytes[..]
            );
            for (index, context) in contexts.iter().enumerate() {
                assert_eq!(
                    &*maybe_decompress(
                        blob.extract_context_data(index as u32).unwrap(),
                        compression
                    )
                    .unwrap(),
                    &context.bytes[..]
                );
            }
        }
    }
}

#[test]
fn blob_survives_byte_serialization() {
    let opts = options(Compression::None);
    let blob = SnapshotBlob::create(
        &SegmentData::new(b"s".to_vec()),
        &SegmentData::new(b"r".to_vec()),
        &[SegmentData::new(b"c".to_vec())],
        false,
        &opts,
    )
    .unwrap();

    let reloaded = SnapshotBlob::from_bytes(blob.as_bytes().to_vec()).unwrap();
    assert_eq!(reloaded, blob);
    assert_eq!(reloaded.extract_context_data(0).unwrap(), b"c");
    assert!(reloaded.verify_checksum(&opts).unwrap());
}
