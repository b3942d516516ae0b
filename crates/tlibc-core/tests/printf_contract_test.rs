//! Contract tests for the formatting engine across all three sink
//! disciplines.

use tlibc_core::config::SafetyLevel;
use tlibc_core::stdio::{
    Arg, ArgList, BoundedSink, GrowableSink, Sink, UnboundedSink, format_bounded, format_to_vec,
    vformat,
};
use tlibc_core::{FormatError, errno};

fn render(fmt: &str, args: &[Arg<'_>]) -> String {
    let bytes = format_to_vec(fmt.as_bytes(), &mut ArgList::new(args)).unwrap();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn literal_only_formats_pass_through() {
    for fmt in ["", "a", "hello, world", "tabs\tand\nnewlines", "ümlaut"] {
        let mut out: Vec<u8> = Vec::new();
        let mut sink = UnboundedSink::new(&mut out);
        let wanted = vformat(fmt.as_bytes(), &mut ArgList::new(&[]), &mut sink, SafetyLevel::Strict)
            .unwrap();
        assert_eq!(wanted, fmt.len());
        assert_eq!(sink.finish().unwrap().stored, fmt.len());
        assert_eq!(out, fmt.as_bytes());
    }
}

#[test]
fn bounded_wanted_matches_growable_for_every_capacity() {
    let fmt = b"%s|%5d|%-4x|%c|%.3f";
    let args = [
        Arg::Str(Some(b"tlibc")),
        Arg::Int(-42),
        Arg::Uint(0xbeef),
        Arg::Int(i64::from(b'z')),
        Arg::Double(2.71828),
    ];
    let full = format_to_vec(fmt, &mut ArgList::new(&args)).unwrap();
    assert_eq!(full, b"tlibc|  -42|beef|z|2.718");

    for n in 0..=full.len() + 4 {
        let mut buf = vec![0xEEu8; n + 2];
        let summary = format_bounded(&mut buf[..n], fmt, &mut ArgList::new(&args)).unwrap();
        assert_eq!(summary.wanted, full.len(), "capacity {n}");
        if n > 0 {
            let stored = full.len().min(n - 1);
            assert_eq!(&buf[..stored], &full[..stored]);
            assert_eq!(buf[stored], 0, "terminator at capacity {n}");
        }
        assert_eq!(&buf[n..], &[0xEE, 0xEE], "wrote past capacity {n}");
    }
}

#[test]
fn signed_decimal_round_trips() {
    let values = [
        0,
        1,
        -1,
        i64::from(i32::MIN),
        i64::from(i32::MAX),
        i64::MIN,
        i64::MAX,
        1_234_567_890_123,
    ];
    for v in values {
        assert_eq!(render("%lld", &[Arg::Int(v)]).parse::<i64>().unwrap(), v);
    }
    for v in [i32::MIN, -1, 0, 1, i32::MAX] {
        let text = render("%d", &[Arg::Int(i64::from(v))]);
        assert_eq!(text.parse::<i32>().unwrap(), v);
    }
    for v in [i8::MIN, 0, i8::MAX] {
        let text = render("%hhd", &[Arg::Int(i64::from(v))]);
        assert_eq!(text.parse::<i8>().unwrap(), v);
    }
    for v in [0u64, 1, u64::MAX] {
        assert_eq!(render("%llu", &[Arg::Uint(v)]).parse::<u64>().unwrap(), v);
    }
}

#[test]
fn padding_examples() {
    assert_eq!(render("%05d", &[Arg::Int(-3)]), "-0003");
    assert_eq!(render("%-5d", &[Arg::Int(3)]), "3    ");
    assert_eq!(render("%+.3d", &[Arg::Int(7)]), "+007");
    assert_eq!(render("%#o", &[Arg::Uint(8)]), "010");
    assert_eq!(render("%#x", &[Arg::Uint(0)]), "0");
    assert_eq!(render("%p", &[Arg::Ptr(0x1000)]), "0x1000");
    assert_eq!(render("[%8p]", &[Arg::Ptr(0)]), "[   (nil)]");
}

#[test]
fn null_string_renders_placeholder() {
    let mut sink = GrowableSink::new();
    let wanted = vformat(
        b"%s",
        &mut ArgList::new(&[Arg::Str(None)]),
        &mut sink,
        SafetyLevel::Strict,
    )
    .unwrap();
    assert!(wanted > 0);
    let out = sink.finish().unwrap();
    assert_eq!(out.as_bytes(), b"(null)");
    assert_eq!(out.bytes, b"(null)\0");
}

#[test]
fn malformed_format_stops_and_reports_einval() {
    let err = format_to_vec(b"abc %k", &mut ArgList::new(&[])).unwrap_err();
    assert_eq!(err, FormatError::MalformedFormat { offset: 4 });
    assert_eq!(err.errno(), errno::EINVAL);

    let mut out: Vec<u8> = Vec::new();
    let mut sink = UnboundedSink::new(&mut out);
    let result = vformat(b"kept %", &mut ArgList::new(&[]), &mut sink, SafetyLevel::Strict);
    assert!(result.is_err());
    sink.flush();
    assert_eq!(out, b"kept ");
}

#[test]
fn bounded_sink_is_not_terminated_on_error() {
    let mut buf = [0xEEu8; 8];
    let mut sink = BoundedSink::new(&mut buf);
    let result = vformat(b"ab%", &mut ArgList::new(&[]), &mut sink, SafetyLevel::Strict);
    assert!(result.is_err());
    drop(sink);
    assert_eq!(&buf[..3], &[b'a', b'b', 0xEE]);
}

#[test]
fn growable_allocation_failure_reports_enomem() {
    let mut sink = GrowableSink::with_ceiling(16);
    let wanted = vformat(
        b"%40s",
        &mut ArgList::new(&[Arg::Str(Some(b"x"))]),
        &mut sink,
        SafetyLevel::Strict,
    )
    .unwrap();
    assert_eq!(wanted, 40);
    let err = sink.finish().unwrap_err();
    assert!(matches!(err, FormatError::AllocationFailed { .. }));
    assert_eq!(err.errno(), errno::ENOMEM);
}

#[test]
fn percent_consumes_no_argument() {
    let mut args = ArgList::new(&[Arg::Int(5)]);
    let mut out: Vec<u8> = Vec::new();
    vformat(b"%%%d%%", &mut args, &mut out, SafetyLevel::Strict).unwrap();
    assert_eq!(out, b"%5%");
    assert_eq!(args.consumed(), 1);
}

#[test]
fn large_width_is_not_capped() {
    let out = render("%5000d", &[Arg::Int(1)]);
    assert_eq!(out.len(), 5000);
    assert!(out.ends_with(" 1"));
}

#[test]
fn precision_past_fmt_limit_pads_with_exact_zeros() {
    for (fmt, head, tail) in [
        ("%.70000f", "1.", ""),
        ("%.70000e", "1.", "e+00"),
        ("%#.70000g", "1.", ""),
    ] {
        let text = render(fmt, &[Arg::Double(1.0)]);
        assert!(text.starts_with(head), "{fmt}");
        assert!(text.ends_with(&format!("0{tail}")), "{fmt}");
        let digits = text.len() - head.len() - tail.len();
        let expected = if fmt.starts_with("%#") { 69_999 } else { 70_000 };
        assert_eq!(digits, expected, "{fmt}");
    }
    assert_eq!(render("%.70000g", &[Arg::Double(1.0)]), "1");

    let mut buf = [0u8; 8];
    let summary = format_bounded(&mut buf, b"%.70000f", &mut ArgList::new(&[Arg::Double(2.5)]))
        .unwrap();
    assert_eq!(summary.wanted, 70_002);
    assert_eq!(&buf, b"2.50000\0");
}
