//! CLI collaborator around `pg-peek-lib`: argument parsing, CSV/Base64
//! decoding, pretty-printing, and logging setup. None of this belongs
//! in the core format engine; it only ever calls into `pg_peek_lib`'s
//! public API.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::Engine as _;
use clap::{Parser, ValueEnum};
use comfy_table::Table;
use pg_peek_lib::row::Field;
use pg_peek_lib::{DecodedField, Schema, Segment, UpdateValue};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    List,
    Read,
    Update,
    #[value(name = "raw_update")]
    RawUpdate,
}

/// Reader/editor for PostgreSQL heap filenode segments.
#[derive(Parser, Debug)]
#[command(name = "pgpk", version, about)]
struct Cli {
    /// Path to the target PostgreSQL filenode
    #[arg(short = 'f', long = "filenode-path")]
    filenode_path: PathBuf,

    /// Operation to perform
    #[arg(short = 'm', long, value_enum)]
    mode: Mode,

    /// Index of the page to read/write
    #[arg(short = 'p', long)]
    page: Option<usize>,

    /// Index of the item to read/write
    #[arg(short = 'i', long)]
    item: Option<usize>,

    /// New item data to set, encoded in Base64; only used in raw_update mode
    #[arg(short = 'b', long = "b64-data")]
    b64_data: Option<String>,

    /// New item data to set, encoded as one CSV record; only used in update mode
    #[arg(short = 'c', long = "csv-data")]
    csv_data: Option<String>,

    /// Datatype CSV extracted from the PostgreSQL server
    #[arg(short = 'd', long = "datatype-csv")]
    datatype_csv: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .without_time()
        .init();

    let cli = Cli::parse();

    if !cli.filenode_path.exists() {
        bail!("supplied filenode path does not exist: {}", cli.filenode_path.display());
    }
    if !cli.filenode_path.is_file() {
        bail!("supplied filenode path is not a file: {}", cli.filenode_path.display());
    }

    let schema = match &cli.datatype_csv {
        Some(csv) => Schema::parse_csv(csv).context("invalid datatype CSV supplied")?,
        None => Schema::raw(),
    };

    let mut segment = Segment::open(&cli.filenode_path, schema)
        .with_context(|| format!("failed to open {}", cli.filenode_path.display()))?;

    match cli.mode {
        Mode::List => run_list(&segment, cli.page),
        Mode::Read => run_read(&segment, cli.page, cli.item),
        Mode::Update => run_update(&mut segment, &cli),
        Mode::RawUpdate => run_raw_update(&mut segment, &cli),
    }
}

fn run_list(segment: &Segment, page: Option<usize>) -> Result<()> {
    match page {
        Some(p) => print_page(segment, p),
        None => {
            for p in 0..segment.num_pages() {
                print_page(segment, p)?;
            }
            Ok(())
        }
    }
}

fn print_page(segment: &Segment, page_idx: usize) -> Result<()> {
    let items = segment.list_page(page_idx)?;
    tracing::info!("page {page_idx}:");

    let mut table = table_with_header(&segment.schema);
    for item in &items {
        match &item.decoded {
            None => continue,
            Some(Ok(fields)) => {
                table.add_row(row_cells(item.index, fields));
            }
            Some(Err(e)) => {
                tracing::warn!("skipping item {} on page {page_idx}: {e}", item.index);
            }
        }
    }
    println!("{table}");
    Ok(())
}

fn run_read(segment: &Segment, page: Option<usize>, item: Option<usize>) -> Result<()> {
    let (page, item) = match (page, item) {
        (Some(p), Some(i)) => (p, i),
        _ => bail!("please provide page and item indexes via --page and --item arguments"),
    };

    let fields = segment.read_item(page, item)?;
    tracing::info!("page {page}:");
    let mut table = table_with_header(&segment.schema);
    table.add_row(row_cells(item, &fields));
    println!("{table}");
    Ok(())
}

fn run_update(segment: &mut Segment, cli: &Cli) -> Result<()> {
    let (page, item, csv_data) = match (cli.page, cli.item, &cli.csv_data) {
        (Some(p), Some(i), Some(c)) if cli.datatype_csv.is_some() => (p, i, c),
        _ => bail!(
            "please provide page, item indexes, and new item data via the \
             --page, --item, --datatype-csv and --csv-data arguments"
        ),
    };

    let values = parse_csv_record(csv_data)?;
    segment.update_item(page, item, UpdateValue::Row(values))?;

    let new_path = new_path_for(&cli.filenode_path);
    segment.save_to(&new_path)?;
    tracing::info!("saved updated filenode to {}", new_path.display());
    Ok(())
}

fn run_raw_update(segment: &mut Segment, cli: &Cli) -> Result<()> {
    let (page, item, b64) = match (cli.page, cli.item, &cli.b64_data) {
        (Some(p), Some(i), Some(b)) => (p, i, b),
        _ => bail!(
            "please provide page, item indexes, and new item data via the \
             --page, --item, and --b64-data arguments"
        ),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .context("invalid base64 data supplied")?;
    segment.update_item(page, item, UpdateValue::Raw(bytes))?;

    let new_path = new_path_for(&cli.filenode_path);
    segment.save_to(&new_path)?;
    tracing::info!("saved updated filenode to {}", new_path.display());
    Ok(())
}

fn new_path_for(path: &PathBuf) -> PathBuf {
    let mut new_path = path.clone();
    new_path.set_extension("new");
    new_path
}

fn parse_csv_record(csv_data: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(csv_data.as_bytes());
    let record = reader
        .records()
        .next()
        .context("invalid CSV data supplied")?
        .context("invalid CSV data supplied")?;
    Ok(record.iter().map(|s| s.to_string()).collect())
}

fn table_with_header(schema: &Schema) -> Table {
    let mut table = Table::new();
    let mut header = vec!["item_no".to_string()];
    match schema {
        Schema::Raw => header.push("raw_data".to_string()),
        Schema::Typed(columns) => header.extend(columns.iter().map(|c| c.name.clone())),
    }
    table.set_header(header);
    table
}

fn row_cells(item_no: usize, fields: &[DecodedField]) -> Vec<String> {
    let mut cells = vec![item_no.to_string()];
    cells.extend(fields.iter().map(|f| field_display(&f.value)));
    cells
}

/// Mirrors the original tool's `x['value'] if x['value'] else 'NULL'`:
/// an explicitly-null field *and* an empty byte value both print as
/// `NULL`.
fn field_display(field: &Field) -> String {
    match field {
        Field::Null => "NULL".to_string(),
        Field::Int(i) => i.to_string(),
        Field::Bytes(b) if b.is_empty() => "NULL".to_string(),
        Field::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
    }
}
