use bpspanel::{
    pipeline::{process_years, write_outputs, CONSISTENCY_CSV, PANEL_CSV, PANEL_PARQUET, VALIDATION_LOG},
    reconcile::{page_keys, reconcile_all, SourceTable},
    Cell, PipelineConfig,
};
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{fs, fs::File, path::Path};
use tempfile::tempdir;
use tracing::subscriber::set_global_default;
use tracing_subscriber::FmtSubscriber;

fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();
    let _ = set_global_default(subscriber);
}

const PAGE_1: &str = r#"[
  {"line_number": "1", "smsa_name": "ABILENE, TEX. OUTSIDE", "total_units": "120", "private_total": "100",
   "private_1_unit": "60", "private_2_units": "10", "private_3_4_units": "10", "private_5plus_units": "20",
   "public_units": "20"},
  {"line_number": "2", "smsa_name": "INSIDE CENTRAL CITY", "total_units": "(X)", "public_units": "2O"},
  {"line_number": "3", "smsa_name": "AKRON, OHIO OUTSIDE", "total_units": "50", "private_total": "40",
   "private_1_unit": "20", "private_2_units": "10", "private_3_4_units": "5", "private_5plus_units": "5",
   "public_units": "5"}
]"#;

const PAGE_2: &str = r#"{"rows": [
  {"line_number": "1", "smsa_name": "TOTAL", "total_units": "170", "private_total": "145",
   "private_1_unit": "80", "private_2_units": "20", "private_3_4_units": "15", "private_5plus_units": "30",
   "public_units": "25"}
]}"#;

fn write_year(root: &Path) {
    let dir = root.join("1967");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("pages_01_02.json"), PAGE_1).unwrap();
    fs::write(dir.join("pages_03_04.json"), PAGE_2).unwrap();
    fs::write(dir.join("pages_05_06.json"), "").unwrap();
}

fn config_for(root: &Path, extra: &str) -> PipelineConfig {
    let yaml = format!(
        "raw_dir: {}\nout_dir: {}\nyears: [1967]\n{}",
        root.join("raw_ocr").display(),
        root.join("panel").display(),
        extra
    );
    PipelineConfig::from_yaml(&yaml).unwrap()
}

#[test]
fn builds_panel_and_reports() {
    init_logging();
    let tmp = tempdir().unwrap();
    write_year(&tmp.path().join("raw_ocr"));
    let config = config_for(tmp.path(), "");

    let outcomes = process_years(&config).unwrap();
    assert_eq!(outcomes.len(), 1);
    let year = &outcomes[0];
    assert_eq!(year.panel.rows.len(), 4);
    assert_eq!(year.panel.sources.len(), 3);
    assert_eq!(year.panel.cell_errors.len(), 1);
    assert_eq!(year.panel.cell_errors[0].raw, "2O");
    assert_eq!(year.panel.rows[1].cell("total_units"), Cell::Missing);

    // the AKRON group runs into the TOTAL line and goes
    assert_eq!(year.grouped.reduced().count(), 2);
    assert_eq!(year.findings.consistency.len(), 1);
    assert_eq!(year.findings.consistency[0].line_number, "3");
    assert_eq!(year.findings.consistency[0].difference, 5.0);

    write_outputs(&outcomes, &config.out_dir, &config.all_columns()).unwrap();

    let panel = fs::read_to_string(config.out_dir.join(PANEL_CSV)).unwrap();
    let lines: Vec<&str> = panel.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("year,group_id,role,source,line_number,name,total_units,private_total"));
    assert!(lines[1].starts_with("1967,0,area_summary,pages_01_02,1,\"ABILENE, TEX. OUTSIDE\",120,100,"));
    assert!(lines[2].starts_with("1967,0,inside_central_city,pages_01_02,2,INSIDE CENTRAL CITY,,"));

    let reader =
        SerializedFileReader::new(File::open(config.out_dir.join(PANEL_PARQUET)).unwrap()).unwrap();
    assert_eq!(reader.metadata().file_metadata().num_rows(), 2);

    let consistency = fs::read_to_string(config.out_dir.join(CONSISTENCY_CSV)).unwrap();
    assert_eq!(consistency.lines().count(), 2);

    let log = fs::read_to_string(config.out_dir.join(VALIDATION_LOG)).unwrap();
    assert!(log.contains("  1967/pages_05_06\n"));
    assert!(log.contains("Line 3 (AKRON, OHIO OUTSIDE): total_units: 50 != 40 + 5 = 45 (diff=+5)"));
    assert!(log.contains("Total validation errors: 1"));
}

#[test]
fn configured_tolerance_silences_small_differences() {
    init_logging();
    let tmp = tempdir().unwrap();
    write_year(&tmp.path().join("raw_ocr"));
    let config = config_for(tmp.path(), "tolerance:\n  units:\n    absolute: 5\n");

    let outcomes = process_years(&config).unwrap();
    assert!(outcomes[0].findings.consistency.is_empty());
}

#[test]
fn pages_reconcile_against_ground_truth() {
    init_logging();
    let tmp = tempdir().unwrap();
    let raw = tmp.path().join("raw_ocr");
    write_year(&raw);

    let truth = tmp.path().join("truth.csv");
    fs::write(
        &truth,
        "page,line_number,smsa_name,total_units,public_units\n\
         pages_01_02,1,ABILENE,120,20\n\
         pages_01_02,3,AKRON,45,\n\
         pages_03_04,1,TOTAL,170,25\n",
    )
    .unwrap();

    let settings = PipelineConfig::default().year(1967);
    let line_keys = vec!["line_number".to_string()];
    // page directories key on page + line even when only the line is asked for
    let gemini = SourceTable::open("gemini", &raw.join("1967"), &line_keys, &settings).unwrap();
    assert_eq!(gemini.rows.len(), 4);

    // ground truth without a page column cannot line up with page rows
    let no_page = tmp.path().join("no_page.csv");
    fs::write(&no_page, "line_number,total_units\n1,120\n").unwrap();
    let keys = page_keys(&line_keys);
    assert!(SourceTable::open("truth", &no_page, &keys, &settings).is_err());

    let truth = SourceTable::open("truth", &truth, &keys, &settings).unwrap();
    let found = reconcile_all(&[gemini, truth]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].row.as_str(), "pages_01_02|3");
    assert_eq!(found[0].field, "total_units");
    assert_eq!(found[0].value_a, Cell::Value(50.0));
    assert_eq!(found[0].value_b, Cell::Value(45.0));
}

#[test]
fn raw_spellings_match_normalized_truth() {
    init_logging();
    let tmp = tempdir().unwrap();
    let pages = tmp.path().join("gpt");
    fs::create_dir_all(&pages).unwrap();
    fs::write(
        pages.join("pages_01_02.json"),
        r#"[{"line_number": "1", "smsa_name": "ABILENE", "total_units": "1 234", "public_units": "-",
             "private_total": "(X)"}]"#,
    )
    .unwrap();
    let truth = tmp.path().join("truth.csv");
    fs::write(
        &truth,
        "page,line_number,total_units,public_units,private_total\npages_01_02,1,1234,0,900\n",
    )
    .unwrap();

    let settings = PipelineConfig::default().year(1967);
    let keys = page_keys(&["line_number".to_string()]);
    let gpt = SourceTable::open("gpt", &pages, &keys, &settings).unwrap();
    let truth = SourceTable::open("truth", &truth, &keys, &settings).unwrap();
    assert!(reconcile_all(&[gpt, truth]).is_empty());
}
