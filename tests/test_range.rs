use lantern::http::range::{
    ByteRange, MAX_RANGES, MULTIPART_BOUNDARY, RangeError, multipart_content_type, multipart_part_header,
    multipart_trailer, parse_range_header, parse_range_spec,
};

#[test]
fn test_range_start_end() {
    let range = parse_range_spec("5-14", 100).unwrap();
    assert_eq!(range, ByteRange { start: 5, end: 14 });
    assert_eq!(range.len(), 10);
    assert_eq!(range.content_range(100), "bytes 5-14/100");
}

#[test]
fn test_range_open_ended() {
    let range = parse_range_spec("90-", 100).unwrap();
    assert_eq!(range, ByteRange { start: 90, end: 99 });
}

#[test]
fn test_range_end_is_clamped() {
    let range = parse_range_spec("50-5000", 100).unwrap();
    assert_eq!(range.end, 99);
    assert_eq!(range.len(), 50);
}

#[test]
fn test_range_suffix() {
    assert_eq!(parse_range_spec("-10", 100).unwrap(), ByteRange { start: 90, end: 99 });
    // longer than the resource: the whole resource
    assert_eq!(parse_range_spec("-500", 100).unwrap(), ByteRange { start: 0, end: 99 });
}

#[test]
fn test_range_start_past_end_not_satisfiable() {
    assert_eq!(parse_range_spec("100-", 100), Err(RangeError::NotSatisfiable(100)));
    assert_eq!(parse_range_spec("-0", 100), Err(RangeError::NotSatisfiable(100)));
}

#[test]
fn test_range_malformed_specs() {
    assert_eq!(parse_range_spec("abc", 100), Err(RangeError::InvalidSyntax));
    assert_eq!(parse_range_spec("10-5", 100), Err(RangeError::InvalidSyntax));
    assert_eq!(parse_range_spec("1x-5", 100), Err(RangeError::InvalidSyntax));
    assert_eq!(parse_range_spec("-", 100), Err(RangeError::InvalidSyntax));
}

#[test]
fn test_range_header_multiple() {
    let ranges = parse_range_header("bytes=0-9, 20-29,-5", 100).unwrap();
    let got: Vec<ByteRange> = ranges.iter().copied().collect();
    assert_eq!(
        got,
        [
            ByteRange { start: 0, end: 9 },
            ByteRange { start: 20, end: 29 },
            ByteRange { start: 95, end: 99 },
        ]
    );
}

#[test]
fn test_range_header_skips_bad_specs() {
    let ranges = parse_range_header("bytes=oops,10-19,500-600", 100).unwrap();
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges.get(0), Some(&ByteRange { start: 10, end: 19 }));
}

#[test]
fn test_range_header_wrong_unit() {
    assert!(matches!(parse_range_header("items=0-5", 100), Err(RangeError::UnsupportedUnit)));
    assert!(matches!(parse_range_header("0-5", 100), Err(RangeError::InvalidSyntax)));
}

#[test]
fn test_multipart_framing() {
    let range = ByteRange { start: 0, end: 4 };
    let header = multipart_part_header("text/plain", &range, 50);

    assert!(header.starts_with(&format!("\r\n--{}\r\n", MULTIPART_BOUNDARY)));
    assert!(header.contains("Content-type: text/plain\r\n"));
    assert!(header.contains("Content-range: bytes 0-4/50\r\n"));
    assert!(header.ends_with("Content-length: 5\r\n\r\n"));
    assert_eq!(multipart_trailer(), format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY));
    assert_eq!(
        multipart_content_type(),
        format!("multipart/byteranges; boundary={}", MULTIPART_BOUNDARY)
    );
}

#[test]
fn test_range_header_too_many_ranges() {
    let header = format!("bytes={}", vec!["0-"; MAX_RANGES + 1].join(","));
    assert!(matches!(
        parse_range_header(&header, 100),
        Err(RangeError::TooManyRanges(MAX_RANGES))
    ));

    let header = format!("bytes={}", vec!["0-0"; MAX_RANGES].join(","));
    assert_eq!(parse_range_header(&header, 100).unwrap().len(), 1);
}

#[test]
fn test_range_header_merges_overlaps() {
    let ranges = parse_range_header("bytes=50-59,0-9,5-14,55-", 100).unwrap();
    let got: Vec<ByteRange> = ranges.iter().copied().collect();
    assert_eq!(
        got,
        [ByteRange { start: 0, end: 14 }, ByteRange { start: 50, end: 99 }]
    );

    // adjacent but disjoint ranges are left alone
    let ranges = parse_range_header("bytes=10-19,0-9", 100).unwrap();
    let got: Vec<ByteRange> = ranges.iter().copied().collect();
    assert_eq!(got, [ByteRange { start: 10, end: 19 }, ByteRange { start: 0, end: 9 }]);
}
