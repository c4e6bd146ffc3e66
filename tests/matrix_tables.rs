mod common;

use std::collections::HashSet;
use std::io::Cursor;

use common::Op2Writer;
use op2_reader::op2::types::models::Complex;
use op2_reader::{
    MatrixData, MatrixValues, Op2Error, Op2Reader, Op2Warning, Precision, ReadOptions,
    ReadOutcome, Result,
};

fn dense_f32(data: &MatrixData) -> (Vec<usize>, Vec<f32>) {
    match data {
        MatrixData::Dense(MatrixValues::Real32(a)) => {
            (a.shape().to_vec(), a.iter().copied().collect())
        }
        other => panic!("expected a dense real32 matrix, got {:?}", other),
    }
}

fn read_bytes(w: &Op2Writer) -> Result<ReadOutcome> {
    Op2Reader::new(ReadOptions::default()).read_stream(Cursor::new(w.bytes().to_vec()))
}

#[test]
fn identity_matrix_round_trip() {
    let mut w = Op2Writer::new(true);
    w.matrix_real32("KAA", 2, 2, &[vec![(1, vec![1.0])], vec![(2, vec![1.0])]])
        .end();
    let temp = w.write_temp();
    let outcome = op2_reader::read(temp.path(), None, HashSet::new(), false).unwrap();

    let kaa = outcome.matrix("KAA").expect("KAA decoded");
    assert_eq!((kaa.rows, kaa.cols), (2, 2));
    assert_eq!(kaa.precision, Precision::Real32);
    assert_eq!(kaa.matrix_id, 101);
    assert_eq!(kaa.nnz, 2);
    let (shape, values) = dense_f32(&kaa.data);
    assert_eq!(shape, vec![2, 2]);
    assert_eq!(values, vec![1.0, 0.0, 0.0, 1.0]);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn segments_fill_consecutive_rows() {
    // column 1: rows 1-2 and row 4; column 2: rows 2-3
    let mut w = Op2Writer::new(false);
    w.matrix_real32(
        "MAA",
        4,
        2,
        &[
            vec![(1, vec![1.0, 2.0]), (4, vec![4.0])],
            vec![(2, vec![5.0, 6.0])],
        ],
    )
    .end();
    let outcome = Op2Reader::new(ReadOptions::default())
        .read_file(w.write_temp().path())
        .unwrap();
    let maa = outcome.matrix("MAA").unwrap();
    assert_eq!(maa.nnz, 5);
    let (shape, values) = dense_f32(&maa.data);
    assert_eq!(shape, vec![4, 2]);
    #[rustfmt::skip]
    let expected = vec![
        1.0, 0.0,
        2.0, 5.0,
        0.0, 6.0,
        4.0, 0.0,
    ];
    assert_eq!(values, expected);
}

#[test]
fn duplicate_entries_are_summed() {
    let mut w = Op2Writer::new(true);
    w.matrix_real32("KAA", 2, 1, &[vec![(1, vec![1.5]), (1, vec![2.0])]])
        .end();
    let outcome = Op2Reader::new(ReadOptions::default())
        .read_stream(std::io::Cursor::new(w.bytes().to_vec()))
        .unwrap();
    let (_, values) = dense_f32(&outcome.matrix("KAA").unwrap().data);
    assert_eq!(values, vec![3.5, 0.0]);
}

#[test]
fn out_of_range_rows_fall_back_with_a_warning() {
    let mut w = Op2Writer::new(true);
    w.matrix_real32("KAA", 2, 2, &[vec![(1, vec![1.0])], vec![(3, vec![7.0])]])
        .end();
    let outcome = Op2Reader::new(ReadOptions::default())
        .read_stream(std::io::Cursor::new(w.bytes().to_vec()))
        .unwrap();

    match &outcome.matrix("KAA").unwrap().data {
        MatrixData::Flat { values, rows, cols } => {
            assert_eq!(values.shape(), &[2]);
            assert_eq!(rows, &vec![0, 2]);
            assert_eq!(cols, &vec![0, 1]);
        }
        other => panic!("expected the flat fallback, got {:?}", other),
    }
    assert!(matches!(
        outcome.warnings.as_slice(),
        [Op2Warning::MatrixAssembly { table, .. }] if table == "KAA"
    ));
}

#[test]
fn unknown_names_need_an_escape_hatch() {
    let mut w = Op2Writer::new(true);
    w.matrix_real32("MYMAT", 1, 1, &[vec![(1, vec![2.0])]]).end();
    let temp = w.write_temp();

    let err = op2_reader::read(temp.path(), None, HashSet::new(), false).unwrap_err();
    assert!(matches!(err.root(), Op2Error::UnclassifiedTable(name) if name == "MYMAT"));

    let extra: HashSet<String> = ["MYMAT".to_string()].into_iter().collect();
    let outcome = op2_reader::read(temp.path(), None, extra, false).unwrap();
    assert_eq!(outcome.matrix("MYMAT").unwrap().nnz, 1);

    let outcome = op2_reader::read(temp.path(), None, HashSet::new(), true).unwrap();
    let (_, values) = dense_f32(&outcome.matrix("MYMAT").unwrap().data);
    assert_eq!(values, vec![2.0]);
}

#[test]
fn sizing_pass_reserves_and_matches() {
    let mut w = Op2Writer::new(false);
    w.matrix_real32("KAA", 3, 3, &[vec![(1, vec![1.0, 2.0, 3.0])], vec![(2, vec![4.0])]])
        .matrix_real32("MAA", 1, 1, &[vec![(1, vec![5.0])]])
        .end();
    let options = ReadOptions {
        two_pass: true,
        ..ReadOptions::default()
    };
    let outcome = Op2Reader::new(options)
        .read_stream(std::io::Cursor::new(w.bytes().to_vec()))
        .unwrap();
    assert_eq!(outcome.sizing_spans.as_deref(), Some(outcome.spans.as_slice()));
    assert_eq!(outcome.matrix("KAA").unwrap().nnz, 4);
    let (_, values) = dense_f32(&outcome.matrix("MAA").unwrap().data);
    assert_eq!(values, vec![5.0]);
}

#[test]
fn huge_sparse_shapes_keep_their_triplets() {
    let mut w = Op2Writer::new(true);
    w.matrix_real32("KAA", 2_000_000_000, 2_000_000_000, &[vec![(1, vec![1.0])]])
        .matrix_real32("MAA", 1, 1, &[vec![(1, vec![5.0])]])
        .end();
    let outcome = read_bytes(&w).unwrap();

    let kaa = outcome.matrix("KAA").unwrap();
    assert_eq!((kaa.rows, kaa.cols, kaa.nnz), (2_000_000_000, 2_000_000_000, 1));
    match &kaa.data {
        MatrixData::Flat { values, rows, cols } => {
            assert_eq!(values, &MatrixValues::Real32(ndarray::arr1(&[1.0f32]).into_dyn()));
            assert_eq!(rows, &vec![0]);
            assert_eq!(cols, &vec![0]);
        }
        other => panic!("expected the flat fallback, got {:?}", other),
    }
    assert!(matches!(
        outcome.warnings.as_slice(),
        [Op2Warning::MatrixAssembly { table, detail }]
            if table == "KAA" && detail.contains("dense limit")
    ));
    let (_, values) = dense_f32(&outcome.matrix("MAA").unwrap().data);
    assert_eq!(values, vec![5.0]);
}

#[test]
fn real64_elements_are_eight_bytes_wide() {
    let mut w = Op2Writer::new(false);
    let column = w.doubles(&[1.5, 2.5]);
    w.matrix("KAA", 2, 1, 2, &[vec![(1, column)]]).end();
    let kaa = read_bytes(&w).unwrap().matrix("KAA").cloned().unwrap();
    assert_eq!(kaa.precision, Precision::Real64);
    assert_eq!(kaa.nnz, 2);
    match kaa.data {
        MatrixData::Dense(MatrixValues::Real64(a)) => {
            assert_eq!(a.shape(), &[2, 1]);
            assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![1.5, 2.5]);
        }
        other => panic!("expected a dense real64 matrix, got {:?}", other),
    }
}

#[test]
fn complex_elements_pair_real_and_imaginary_parts() {
    let mut w = Op2Writer::new(true);
    let c1 = w.floats(&[1.0, 2.0]);
    let c2 = w.floats(&[3.0, -1.0]);
    let z = w.doubles(&[0.5, -0.25]);
    w.matrix("KHH1", 1, 2, 3, &[vec![(1, c1)], vec![(1, c2)]])
        .matrix("MHH1", 1, 1, 4, &[vec![(1, z)]])
        .end();
    let outcome = read_bytes(&w).unwrap();
    assert!(outcome.warnings.is_empty());

    let khh = outcome.matrix("KHH1").unwrap();
    assert_eq!((khh.precision, khh.nnz), (Precision::Complex64, 2));
    match &khh.data {
        MatrixData::Dense(MatrixValues::Complex64(a)) => {
            assert_eq!(a.shape(), &[1, 2]);
            assert_eq!(
                a.iter().copied().collect::<Vec<_>>(),
                vec![Complex { re: 1.0, im: 2.0 }, Complex { re: 3.0, im: -1.0 }]
            );
        }
        other => panic!("expected a dense complex64 matrix, got {:?}", other),
    }

    let mhh = outcome.matrix("MHH1").unwrap();
    assert_eq!((mhh.precision, mhh.nnz), (Precision::Complex128, 1));
    match &mhh.data {
        MatrixData::Dense(MatrixValues::Complex128(a)) => {
            assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![Complex { re: 0.5, im: -0.25 }]);
        }
        other => panic!("expected a dense complex128 matrix, got {:?}", other),
    }
}

#[test]
fn ragged_element_bytes_are_a_length_error() {
    // one word of data under an eight-byte precision
    let mut w = Op2Writer::new(false);
    let half = w.floats(&[1.0]);
    w.matrix("KAA", 1, 1, 2, &[vec![(1, half)]]).end();
    let err = read_bytes(&w).unwrap_err();
    assert!(matches!(err, Op2Error::Table { ref table, .. } if table == "KAA"), "{}", err);
    assert!(matches!(
        err.root(),
        Op2Error::RecordLength { detail, .. } if detail.contains("8-byte elements")
    ));
}

#[test]
fn unknown_precision_is_consumed_without_values() {
    for code in [0, 9] {
        let mut w = Op2Writer::new(true);
        let column = w.floats(&[1.0, 2.0]);
        w.matrix("KAA", 2, 2, code, &[vec![(1, column)]])
            .matrix_real32("MAA", 1, 1, &[vec![(1, vec![5.0])]])
            .end();
        let outcome = read_bytes(&w).unwrap();

        assert_eq!(outcome.table_names, vec!["KAA", "MAA"]);
        let kaa = outcome.matrix("KAA").unwrap();
        assert_eq!(kaa.precision, Precision::Unknown(code));
        assert_eq!(kaa.nnz, 2);
        assert_eq!(kaa.data, MatrixData::Absent);
        assert_eq!(
            outcome.warnings,
            vec![Op2Warning::UnknownPrecision {
                table: "KAA".to_string(),
                code,
            }]
        );
        let (_, values) = dense_f32(&outcome.matrix("MAA").unwrap().data);
        assert_eq!(values, vec![5.0]);
    }
}
