//! Whole-file decoding tests on synthetic PTU images.

use approx::assert_relative_eq;
use ptuflim_ptu::{
    decode_file, tags, DecoderConfig, Error, Header, HeaderBuilder, RecordType, TagValue,
};

fn build_file(record_type: RecordType, words: &[u32], declared: usize) -> Vec<u8> {
    let header = HeaderBuilder::new("1.0.00")
        .tag("File_Comment", TagValue::AnsiString("synthetic".into()))
        .tag("File_CreatingTime", TagValue::date_time(43_599.5))
        .tag(tags::RECORD_TYPE, TagValue::Int(i64::from(record_type.code())))
        .tag(
            tags::NUMBER_OF_RECORDS,
            TagValue::Int(i64::try_from(declared).unwrap()),
        )
        .tag(tags::RESOLUTION, TagValue::Float(4e-12))
        .tag(tags::GLOBAL_RESOLUTION, TagValue::Float(12.5e-9))
        .tag(tags::SYNC_RATE, TagValue::Int(80_000_000))
        .indexed_tag("HWInpChan_Offs", 0, TagValue::Int(0))
        .indexed_tag("HWInpChan_Offs", 1, TagValue::Int(2500))
        .build()
        .unwrap();

    let mut bytes = header.to_bytes();
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    bytes
}

#[test]
fn test_decode_file_all_record_types() {
    for record_type in RecordType::ALL {
        let layout = record_type.layout();
        let words = [
            layout.encode_photon(10, 3, 2),
            layout.encode_marker(32, 1),
            layout.encode_overflow(1),
            layout.encode_photon(12, 3, 2),
        ];
        let file = build_file(record_type, &words, words.len());
        let (header, events, stats) = decode_file(&file, &DecoderConfig::default()).unwrap();

        assert_eq!(header.record_type().unwrap(), record_type);
        assert_eq!(events.len(), 3, "{record_type}");
        assert_eq!(stats.overflow_events, 1, "{record_type}");
        assert_eq!(events.sync[2], layout.wraparound() + 12, "{record_type}");
        assert_eq!(events.photon_count(), 2, "{record_type}");
        assert!(events.sync.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn test_truncated_records() {
    let layout = RecordType::PicoHarpT3.layout();
    let words = [layout.encode_photon(1, 1, 0), layout.encode_photon(2, 1, 0)];
    let file = build_file(RecordType::PicoHarpT3, &words, 5);

    match decode_file(&file, &DecoderConfig::default()) {
        Err(Error::TruncatedRecords {
            expected,
            available,
        }) => {
            assert_eq!(expected, 5);
            assert_eq!(available, 2);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_declared_count_limits_decoding() {
    let layout = RecordType::PicoHarpT3.layout();
    let words = [
        layout.encode_photon(1, 1, 0),
        layout.encode_photon(2, 1, 0),
        layout.encode_photon(3, 1, 0),
    ];
    let file = build_file(RecordType::PicoHarpT3, &words, 2);
    let (_, events, _) = decode_file(&file, &DecoderConfig::default()).unwrap();
    assert_eq!(events.sync, vec![1, 2]);
}

#[test]
fn test_unsupported_record_type_aborts() {
    let header = HeaderBuilder::new("1.0.00")
        .tag(tags::RECORD_TYPE, TagValue::Int(0x0001_0308))
        .tag(tags::NUMBER_OF_RECORDS, TagValue::Int(0))
        .build()
        .unwrap();
    assert!(matches!(
        decode_file(&header.to_bytes(), &DecoderConfig::default()),
        Err(Error::UnsupportedHardware(0x0001_0308))
    ));
}

#[test]
fn test_header_metadata() {
    let file = build_file(RecordType::HydraHarpT3, &[], 0);
    let header = Header::parse(&file).unwrap();

    assert_relative_eq!(header.float(tags::RESOLUTION).unwrap(), 4e-12);
    assert_relative_eq!(header.float(tags::SYNC_RATE).unwrap(), 80e6);
    assert_eq!(
        header.get("File_CreatingTime").and_then(TagValue::as_str),
        Some("2019-05-14 12:00:00")
    );
    assert_eq!(
        header.get_indexed("HWInpChan_Offs", 1),
        Some(&TagValue::Int(2500))
    );

    let json = header.to_json();
    assert_eq!(json["HWInpChan_Offs(1)"], 2500);
    assert_eq!(json["TTResultFormat_TTTRRecType"], 0x0001_0304);
}

#[test]
fn test_missing_magic_is_rejected() {
    let mut file = build_file(RecordType::PicoHarpT3, &[], 0);
    file[0] = b'X';
    assert!(matches!(
        decode_file(&file, &DecoderConfig::default()),
        Err(Error::FormatError(_))
    ));
}
