//! End-to-end tests of the file-level operations.
//!
//! Every test writes a small coordinate-sorted BAM modelled on the classic
//! two-reference `ex1` data set (`chr1` 1575 bp, `chr2` 1584 bp) into a
//! temporary directory and runs the operations on it.

use std::fs::File;
use std::num::NonZeroUsize;
use std::path::Path;

use bstr::BString;
use noodles::bam;
use noodles::core::Position;
use noodles::sam;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record::cigar::op::{Kind, Op};
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::{Cigar, QualityScores, Sequence};
use noodles::sam::alignment::RecordBuf;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use noodles::sam::header::record::value::map::{Header as HeaderRecord, ReferenceSequence};
use noodles::sam::header::record::value::Map;
use tempfile::TempDir;

use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::Data;

use bam_transform::container::{build_index, index_path_for, open_for_read};
use bam_transform::job::{BuildUnit, Outcome, StampPolicy};
use bam_transform::ops::{
    count_gene_reads, count_references, filter_and_rename, rename_references, subtract_files,
};
use bam_transform::parsing::genes::parse_gene_tsv;
use bam_transform::{
    IdentityMode, IndexPolicy, ReferenceTable, SubstitutionMap, Target, TransformError,
    TransformOptions,
};

const CHR1: (&str, usize) = ("chr1", 1575);
const CHR2: (&str, usize) = ("chr2", 1584);

fn header(references: &[(&str, usize)], sorted: bool) -> sam::Header {
    let mut builder = sam::Header::builder();
    if sorted {
        let hd = Map::<HeaderRecord>::builder()
            .insert(header_tag::SORT_ORDER, BString::from("coordinate"))
            .build()
            .unwrap();
        builder = builder.set_header(hd);
    }
    for (name, length) in references {
        builder = builder.add_reference_sequence(
            *name,
            Map::<ReferenceSequence>::new(NonZeroUsize::new(*length).unwrap()),
        );
    }
    builder.build()
}

fn read(
    name: &str,
    flags: Flags,
    placement: Option<(usize, usize)>,
    mate: Option<(usize, usize)>,
) -> RecordBuf {
    let mut builder = RecordBuf::builder()
        .set_name(BString::from(name))
        .set_flags(flags)
        .set_sequence(Sequence::from(b"ACGTACGTAC".to_vec()))
        .set_quality_scores(QualityScores::from(vec![30u8; 10]));

    if let Some((id, start)) = placement {
        builder = builder
            .set_reference_sequence_id(id)
            .set_alignment_start(Position::try_from(start).unwrap());
        if !flags.is_unmapped() {
            builder = builder.set_cigar(Cigar::from(vec![Op::new(Kind::Match, 10)]));
        }
    }
    if let Some((id, start)) = mate {
        builder = builder
            .set_mate_reference_sequence_id(id)
            .set_mate_alignment_start(Position::try_from(start).unwrap());
    }
    builder.build()
}

fn pair(records: &mut Vec<RecordBuf>, name: &str, a: (usize, usize), b: (usize, usize)) {
    let paired = Flags::SEGMENTED;
    records.push(read(
        name,
        paired | Flags::FIRST_SEGMENT | Flags::MATE_REVERSE_COMPLEMENTED,
        Some(a),
        Some(b),
    ));
    records.push(read(
        name,
        paired | Flags::LAST_SEGMENT | Flags::REVERSE_COMPLEMENTED,
        Some(b),
        Some(a),
    ));
}

fn sort(records: &mut [RecordBuf]) {
    records.sort_by_key(|r| {
        (
            r.reference_sequence_id().unwrap_or(usize::MAX),
            r.alignment_start().map_or(0, usize::from),
        )
    });
}

/// 88 records: 43 placed on chr1, 37 on chr2 and 8 unplaced.
fn full_records() -> Vec<RecordBuf> {
    let mut records = Vec::new();
    for i in 0..20 {
        pair(&mut records, &format!("c1_{i}"), (0, 10 + i * 50), (0, 60 + i * 50));
    }
    for i in 0..15 {
        pair(&mut records, &format!("c2_{i}"), (1, 20 + i * 60), (1, 80 + i * 60));
    }
    for i in 0..3 {
        pair(&mut records, &format!("x_{i}"), (0, 1000 + i * 10), (1, 1200 + i * 10));
    }
    for i in 0..2 {
        let name = format!("half_{i}");
        let at = (1, 1400 + i * 20);
        records.push(read(
            &name,
            Flags::SEGMENTED | Flags::FIRST_SEGMENT | Flags::MATE_UNMAPPED,
            Some(at),
            Some(at),
        ));
        records.push(read(
            &name,
            Flags::SEGMENTED | Flags::LAST_SEGMENT | Flags::UNMAPPED,
            Some(at),
            Some(at),
        ));
    }
    for i in 0..4 {
        let name = format!("u_{i}");
        let unmapped = Flags::SEGMENTED | Flags::UNMAPPED | Flags::MATE_UNMAPPED;
        records.push(read(&name, unmapped | Flags::FIRST_SEGMENT, None, None));
        records.push(read(&name, unmapped | Flags::LAST_SEGMENT, None, None));
    }
    sort(&mut records);
    records
}

fn write_bam(path: &Path, header: &sam::Header, records: &[RecordBuf]) {
    let mut writer = File::create(path).map(bam::io::Writer::new).unwrap();
    writer.write_header(header).unwrap();
    for record in records {
        writer.write_alignment_record(header, record).unwrap();
    }
    let mut bgzf_writer = writer.into_inner();
    bgzf_writer.try_finish().unwrap();
}

fn read_bam(path: &Path) -> (sam::Header, ReferenceTable, Vec<RecordBuf>) {
    let mut source = open_for_read(path).unwrap();
    let records: Vec<RecordBuf> = source.records().collect::<Result<_, _>>().unwrap();
    (source.header().clone(), source.table().clone(), records)
}

/// Records returned by a random-access query through the companion index
fn query_count(path: &Path, region: &str) -> usize {
    let mut reader = bam::io::indexed_reader::Builder::default()
        .build_from_path(path)
        .unwrap();
    let header = reader.read_header().unwrap();
    let region = region.parse().unwrap();
    reader
        .query(&header, &region)
        .unwrap()
        .map(Result::unwrap)
        .count()
}

fn fixture(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("ex1.bam");
    write_bam(&path, &header(&[CHR1, CHR2], true), &full_records());
    path
}

fn shu_sha() -> SubstitutionMap {
    SubstitutionMap::renames([("chr1", "shu"), ("chr2", "sha")]).unwrap()
}

/// Test that renaming changes only the header names
#[test]
fn test_rename_references() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("renamed.bam");

    let summary =
        rename_references(&input, &output, &shu_sha(), &TransformOptions::default()).unwrap();

    assert_eq!(summary.records_in, 88);
    assert_eq!(summary.records_out, 88);
    assert_eq!(summary.records_dropped, 0);
    assert_eq!(summary.references_out, 2);
    assert_eq!(
        summary.index.as_deref(),
        Some(index_path_for(&output).display().to_string().as_str())
    );
    assert!(index_path_for(&output).exists());

    let (_, table, records) = read_bam(&output);
    assert_eq!(table.names(), vec!["shu", "sha"]);
    assert_eq!(table.get(0).map(|e| e.length), Some(1575));
    assert_eq!(table.get(1).map(|e| e.length), Some(1584));

    // Same order, so every record is identical including its reference ids.
    let (_, _, original) = read_bam(&input);
    assert_eq!(records, original);
}

/// Test that renaming keeps unrelated header lines
#[test]
fn test_rename_keeps_sort_order() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("renamed.bam");

    rename_references(&input, &output, &shu_sha(), &TransformOptions::default()).unwrap();

    let (header, _, _) = read_bam(&output);
    assert!(bam_transform::container::is_coordinate_sorted(&header));
}

/// Test that renaming with the inverse map restores the original file
#[test]
fn test_rename_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let renamed = dir.path().join("renamed.bam");
    let restored = dir.path().join("restored.bam");
    let options = TransformOptions::default();

    let map = shu_sha();
    rename_references(&input, &renamed, &map, &options).unwrap();
    rename_references(&renamed, &restored, &map.inverse(), &options).unwrap();

    let (_, original_table, original_records) = read_bam(&input);
    let (_, restored_table, restored_records) = read_bam(&restored);
    assert_eq!(original_table, restored_table);
    assert_eq!(original_records, restored_records);
}

/// Test that a map matching no header reference fails without output
#[test]
fn test_rename_no_effective_change() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("renamed.bam");

    let map = SubstitutionMap::renames([("chrX", "x"), ("chr11", "eleven")]).unwrap();
    let result = rename_references(&input, &output, &map, &TransformOptions::default());

    assert!(matches!(result, Err(TransformError::NoEffectiveChange)));
    assert!(!output.exists());
    assert!(!index_path_for(&output).exists());
}

/// Test that a rename map must cover every reference
#[test]
fn test_rename_incomplete_map() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("renamed.bam");

    let map = SubstitutionMap::renames([("chr1", "shu")]).unwrap();
    let result = rename_references(&input, &output, &map, &TransformOptions::default());

    match result {
        Err(TransformError::IncompleteRenameMap { uncovered }) => {
            assert_eq!(uncovered, vec!["chr2".to_string()]);
        }
        other => panic!("expected IncompleteRenameMap, got {other:?}"),
    }
    assert!(!output.exists());
}

/// Test that filtering keeps only chr2 records, renamed to `sha`
#[test]
fn test_filter_and_rename() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("chr2.bam");

    let map = SubstitutionMap::renames([("chr2", "sha")]).unwrap();
    let summary = filter_and_rename(&input, &output, &map, &TransformOptions::default()).unwrap();

    assert_eq!(summary.records_in, 88);
    assert_eq!(summary.records_out, 37);
    assert_eq!(summary.references_in, 2);
    assert_eq!(summary.references_out, 1);
    assert!(index_path_for(&output).exists());

    let (_, table, records) = read_bam(&output);
    assert_eq!(table.names(), vec!["sha"]);
    assert_eq!(records.len(), 37);
    assert!(records.iter().all(|r| r.reference_sequence_id() == Some(0)));

    // Mates left behind on chr1 are unset; mates on chr2 follow the rename.
    for record in &records {
        let name = record.name().map(ToString::to_string).unwrap_or_default();
        if name.starts_with("x_") {
            assert_eq!(record.mate_reference_sequence_id(), None);
        } else {
            assert_eq!(record.mate_reference_sequence_id(), Some(0));
        }
    }

    let counts = count_references(&output).unwrap();
    assert_eq!(counts.total(), 37);
    assert_eq!(counts.get("sha").map(|c| (c.mapped, c.unmapped)), Some((35, 2)));
}

/// Test that the rebuilt index answers queries under the new names
#[test]
fn test_indexed_query_after_rename() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("renamed.bam");

    rename_references(&input, &output, &shu_sha(), &TransformOptions::default()).unwrap();

    assert_eq!(query_count(&output, "shu"), 43);
    assert_eq!(query_count(&output, "sha"), 37);
    // c2_0 (both mates) and the first mate of c2_1
    assert_eq!(query_count(&output, "sha:1-100"), 3);

    let mut reader = bam::io::indexed_reader::Builder::default()
        .build_from_path(&output)
        .unwrap();
    let header = reader.read_header().unwrap();
    let unplaced = reader
        .query_unmapped()
        .unwrap()
        .map(Result::unwrap)
        .filter(|r| r.reference_sequence_id().is_none())
        .count();
    assert_eq!(unplaced, 8);

    let old_name = "chr1".parse().unwrap();
    assert!(reader.query(&header, &old_name).is_err());
}

/// Test that the index of a filtered file covers only the kept reference
#[test]
fn test_indexed_query_after_filter() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("chr2.bam");

    let map = SubstitutionMap::renames([("chr2", "sha")]).unwrap();
    filter_and_rename(&input, &output, &map, &TransformOptions::default()).unwrap();

    assert_eq!(query_count(&output, "sha"), 37);
    assert_eq!(query_count(&output, "sha:1400-1500"), 4);
}

/// Test that an explicit drop behaves like leaving the reference out
#[test]
fn test_filter_explicit_drop() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let implicit = dir.path().join("implicit.bam");
    let explicit = dir.path().join("explicit.bam");
    let options = TransformOptions::default();

    let keep = SubstitutionMap::renames([("chr2", "sha")]).unwrap();
    let keep_and_drop = SubstitutionMap::new([
        ("chr1", Target::Drop),
        ("chr2", Target::Rename("sha".to_string())),
    ])
    .unwrap();

    filter_and_rename(&input, &implicit, &keep, &options).unwrap();
    filter_and_rename(&input, &explicit, &keep_and_drop, &options).unwrap();

    let (_, _, a) = read_bam(&implicit);
    let (_, _, b) = read_bam(&explicit);
    assert_eq!(a, b);
}

/// Test that an unsorted output is not indexed unless required
#[test]
fn test_index_policy_on_unsorted_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("unsorted.bam");
    write_bam(&input, &header(&[CHR1, CHR2], false), &full_records());

    let output = dir.path().join("out.bam");
    let always = TransformOptions {
        index: IndexPolicy::Always,
        ..TransformOptions::default()
    };
    let result = rename_references(&input, &output, &shu_sha(), &always);
    assert!(matches!(result, Err(TransformError::InvalidHeader(_))));
    assert!(!output.exists());

    let summary =
        rename_references(&input, &output, &shu_sha(), &TransformOptions::default()).unwrap();
    assert!(summary.index.is_none());
    assert!(output.exists());
    assert!(!index_path_for(&output).exists());
}

/// Test that `Never` skips the index on sorted output
#[test]
fn test_index_policy_never() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("out.bam");
    let options = TransformOptions {
        index: IndexPolicy::Never,
        ..TransformOptions::default()
    };

    let summary = rename_references(&input, &output, &shu_sha(), &options).unwrap();
    assert!(summary.index.is_none());
    assert!(!index_path_for(&output).exists());
}

/// 13 records shared with the full fixture plus one that is not.
fn subset(dir: &TempDir) -> std::path::PathBuf {
    let shared = |name: &str| {
        (0..5).any(|i| name == format!("c1_{i}")) || name == "u_0"
    };

    let mut records: Vec<RecordBuf> = full_records()
        .into_iter()
        .filter(|r| {
            let name = r.name().map(ToString::to_string).unwrap_or_default();
            shared(&name)
                || (name == "c2_0" && r.flags().is_first_segment())
        })
        .collect();
    records.push(read("extra", Flags::empty(), Some((0, 500)), None));
    sort(&mut records);
    assert_eq!(records.len(), 14);

    let path = dir.path().join("subset.bam");
    write_bam(&path, &header(&[CHR1, CHR2], true), &records);
    path
}

/// Test the subtraction count: full minus the records both files share
#[test]
fn test_subtract_files() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let exclude = subset(&dir);
    let output = dir.path().join("rest.bam");

    let summary = subtract_files(&input, &exclude, &output, &TransformOptions::default()).unwrap();

    assert_eq!(summary.records_in, 88);
    assert_eq!(summary.records_out, 88 - 13);
    assert_eq!(summary.references_out, 2);
    assert_eq!(summary.exclusion_keys, Some(14));
    assert!(index_path_for(&output).exists());

    let (_, table, records) = read_bam(&output);
    assert_eq!(table.names(), vec!["chr1", "chr2"]);
    assert_eq!(records.len(), 75);

    // The second mate of c2_0 was not excluded; its first mate was.
    let c2_0: Vec<_> = records
        .iter()
        .filter(|r| r.name().map(ToString::to_string).as_deref() == Some("c2_0"))
        .collect();
    assert_eq!(c2_0.len(), 1);
    assert!(c2_0[0].flags().is_last_segment());

    // Survivors are byte-for-byte the input records, in input order.
    let (_, _, original) = read_bam(&input);
    let mut expected = original.iter();
    for record in &records {
        assert!(expected.any(|o| o == record));
    }
}

/// Test that subtraction creates the output's missing parent directories
#[test]
fn test_subtract_into_missing_directory() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let exclude = subset(&dir);
    let output = dir.path().join("nested").join("sub").join("out.bam");

    let summary = subtract_files(&input, &exclude, &output, &TransformOptions::default()).unwrap();

    assert_eq!(summary.records_out, 75);
    assert_eq!(read_bam(&output).2.len(), 75);
    assert!(index_path_for(&output).exists());
}

/// Test that subtracting the same exclusion twice changes nothing
#[test]
fn test_subtract_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let exclude = subset(&dir);
    let once = dir.path().join("once.bam");
    let twice = dir.path().join("twice.bam");
    let options = TransformOptions::default();

    subtract_files(&input, &exclude, &once, &options).unwrap();
    let summary = subtract_files(&once, &exclude, &twice, &options).unwrap();

    assert_eq!(summary.records_in, 75);
    assert_eq!(summary.records_out, 75);
    let (_, _, a) = read_bam(&once);
    let (_, _, b) = read_bam(&twice);
    assert_eq!(a, b);
}

/// Test that subtracting a file from itself leaves only the header
#[test]
fn test_subtract_self() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("empty.bam");

    let summary = subtract_files(&input, &input, &output, &TransformOptions::default()).unwrap();
    assert_eq!(summary.records_out, 0);

    let (_, table, records) = read_bam(&output);
    assert_eq!(table.names(), vec!["chr1", "chr2"]);
    assert!(records.is_empty());
}

/// Test that references are matched by name when headers are ordered differently
#[test]
fn test_subtract_reordered_exclude_header() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);

    // c2_0 first mate, written against a header that lists chr2 first.
    let mut records: Vec<RecordBuf> = full_records()
        .into_iter()
        .filter(|r| {
            r.name().map(ToString::to_string).as_deref() == Some("c2_0")
                && r.flags().is_first_segment()
        })
        .collect();
    for record in &mut records {
        *record.reference_sequence_id_mut() = Some(0);
        *record.mate_reference_sequence_id_mut() = Some(0);
    }
    let exclude = dir.path().join("reordered.bam");
    write_bam(&exclude, &header(&[CHR2, CHR1], true), &records);

    let output = dir.path().join("rest.bam");
    let summary = subtract_files(&input, &exclude, &output, &TransformOptions::default()).unwrap();
    assert_eq!(summary.records_out, 87);
}

/// Test that an exclude file citing a conflicting reference is rejected
#[test]
fn test_subtract_incompatible_tables() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);

    let exclude = dir.path().join("other.bam");
    let records = vec![read("r1", Flags::empty(), Some((0, 100)), None)];
    write_bam(&exclude, &header(&[("1", 1575), CHR2], true), &records);

    let output = dir.path().join("rest.bam");
    let result = subtract_files(&input, &exclude, &output, &TransformOptions::default());
    assert!(matches!(
        result,
        Err(TransformError::IncompatibleReferenceTables(_))
    ));
    assert!(!output.exists());
}

/// Test that sequence-aware identity is at least as strict as the default
#[test]
fn test_subtract_with_sequence_identity() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let exclude = subset(&dir);
    let output = dir.path().join("rest.bam");
    let options = TransformOptions {
        identity: IdentityMode::WithSequence,
        ..TransformOptions::default()
    };

    // Fixture records share bases and qualities, so the result is the same.
    let summary = subtract_files(&input, &exclude, &output, &options).unwrap();
    assert_eq!(summary.records_out, 75);
}

/// Test per-reference counts of the fixture
#[test]
fn test_count_references() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);

    let counts = count_references(&input).unwrap();
    assert_eq!(counts.total(), 88);
    assert_eq!(counts.unplaced_unmapped, 8);
    assert_eq!(counts.get("chr1").map(|c| (c.mapped, c.unmapped)), Some((43, 0)));
    assert_eq!(counts.get("chr2").map(|c| (c.mapped, c.unmapped)), Some((35, 2)));
}

/// Test that a stamped unit skips work until an input changes
#[test]
fn test_build_unit_with_stamp() {
    let dir = TempDir::new().unwrap();
    let input = fixture(&dir);
    let output = dir.path().join("renamed.bam");
    let options = TransformOptions::default();
    let map = shu_sha();

    let unit = || {
        BuildUnit::new("rename")
            .input(&input)
            .output(&output)
            .output(index_path_for(&output))
            .param("map", &map)
            .unwrap()
    };
    let work = || rename_references(&input, &output, &map, &options);

    assert!(matches!(
        unit().run(&StampPolicy, work).unwrap(),
        Outcome::Built(_)
    ));
    assert!(matches!(
        unit().run(&StampPolicy, work).unwrap(),
        Outcome::UpToDate
    ));

    let changed = SubstitutionMap::renames([("chr1", "1"), ("chr2", "2")]).unwrap();
    let unit = unit().param("map", &changed).unwrap();
    assert!(matches!(
        unit.run(&StampPolicy, || rename_references(&input, &output, &changed, &options))
            .unwrap(),
        Outcome::Built(_)
    ));
    let (_, table, _) = read_bam(&output);
    assert_eq!(table.names(), vec!["1", "2"]);
}

fn aligned(name: &str, reference: usize, start: usize, ops: &[(Kind, usize)], hits: Option<u8>) -> RecordBuf {
    let read_length: usize = ops
        .iter()
        .filter(|(kind, _)| kind.consumes_read())
        .map(|(_, len)| len)
        .sum();
    let mut builder = RecordBuf::builder()
        .set_name(BString::from(name))
        .set_flags(Flags::empty())
        .set_reference_sequence_id(reference)
        .set_alignment_start(Position::try_from(start).unwrap())
        .set_cigar(Cigar::from(
            ops.iter().map(|&(kind, len)| Op::new(kind, len)).collect::<Vec<_>>(),
        ))
        .set_sequence(Sequence::from(vec![b'A'; read_length]))
        .set_quality_scores(QualityScores::from(vec![30u8; read_length]));
    if let Some(hits) = hits {
        let data: Data = [(Tag::ALIGNMENT_HIT_COUNT, Value::from(hits))]
            .into_iter()
            .collect();
        builder = builder.set_data(data);
    }
    builder.build()
}

const GENES: &str = "\
# gene\treference\tstart\tend
g1\tchr1\t100\t200
g1\tchr1\t300\t400
g2\tchr1\t350\t500
g3\tchr2\t0\t100
g4\tchr2\t1000\t1100
";

/// Reads against `GENES`: g1 gets three unique reads and one multimapper
/// placed twice, g2 and g3 one read each, g4 none.
fn write_gene_fixture(dir: &TempDir) -> std::path::PathBuf {
    let m10 = [(Kind::Match, 10)];
    let mut records = vec![
        aligned("r1", 0, 111, &m10, None),
        aligned("m1", 0, 121, &m10, Some(2)),
        aligned(
            "r2",
            0,
            151,
            &[(Kind::Match, 10), (Kind::Skip, 150), (Kind::Match, 10)],
            Some(1),
        ),
        aligned("m1", 0, 181, &m10, Some(2)),
        aligned("r3", 0, 361, &m10, None),
        aligned("r4", 1, 11, &m10, None),
        read("u1", Flags::UNMAPPED, Some((1, 51)), None),
        aligned("r5", 1, 601, &m10, None),
    ];
    sort(&mut records);

    let path = dir.path().join("genes.bam");
    write_bam(&path, &header(&[CHR1, CHR2], true), &records);
    build_index(&path).unwrap();
    path
}

/// Test per-gene counts with spliced reads and a deduplicated multimapper
#[test]
fn test_count_gene_reads() {
    let dir = TempDir::new().unwrap();
    let input = write_gene_fixture(&dir);
    let genes = parse_gene_tsv(GENES).unwrap();

    let counts = count_gene_reads(&input, None, &genes).unwrap();

    assert_eq!(counts.get("g1"), Some(4));
    assert_eq!(counts.get("g2"), Some(1));
    assert_eq!(counts.get("g3"), Some(1));
    assert_eq!(counts.get("g4"), Some(0));
    assert_eq!(counts.references.get("chr1"), Some(&5));
    assert_eq!(counts.references.get("chr2"), Some(&1));
    assert_eq!(counts.total(), 6);

    let flat = counts.to_flat();
    assert_eq!(flat.get("_total"), Some(&6));
    assert_eq!(flat.get("_chr1"), Some(&5));
}

/// Test that an index at a non-default path can be supplied
#[test]
fn test_count_gene_reads_explicit_index() {
    let dir = TempDir::new().unwrap();
    let input = write_gene_fixture(&dir);
    let moved = dir.path().join("elsewhere.bai");
    std::fs::rename(index_path_for(&input), &moved).unwrap();
    let genes = parse_gene_tsv(GENES).unwrap();

    assert!(matches!(
        count_gene_reads(&input, None, &genes),
        Err(TransformError::Io(_))
    ));
    let counts = count_gene_reads(&input, Some(&moved), &genes).unwrap();
    assert_eq!(counts.total(), 6);
}

/// Test that genes on an undeclared reference are rejected
#[test]
fn test_count_gene_reads_unknown_reference() {
    let dir = TempDir::new().unwrap();
    let input = write_gene_fixture(&dir);
    let genes = parse_gene_tsv("g1\tchr1\t100\t200\ngX\tchrX\t0\t10\n").unwrap();

    let result = count_gene_reads(&input, None, &genes);
    match result {
        Err(TransformError::InvalidGeneIntervals(msg)) => assert!(msg.contains("chrX")),
        other => panic!("expected InvalidGeneIntervals, got {other:?}"),
    }
}
