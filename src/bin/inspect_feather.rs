use anyhow::{anyhow, Result};
use arrow::array::{Array, StringArray};
use arrow::ipc::reader::FileReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} <feather_file>", args[0]);
        std::process::exit(1);
    }

    let file = File::open(&args[1])?;
    let reader = FileReaderBuilder::new().build(file)?;

    println!("\nSchema:");
    println!("{:#?}", reader.schema());

    let mut rows = 0usize;
    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    for batch in reader {
        let batch = batch?;
        rows += batch.num_rows();
        let Some(column) = batch.column_by_name("kind") else {
            continue;
        };
        let column = column
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("kind column should be strings"))?;
        for idx in 0..column.len() {
            let kind = if column.is_null(idx) || column.value(idx).is_empty() {
                "record"
            } else {
                column.value(idx)
            };
            *kinds.entry(kind.to_string()).or_default() += 1;
        }
    }

    println!("\nRows: {}", rows);
    for (kind, count) in &kinds {
        println!("  {:<10} {}", kind, count);
    }

    Ok(())
}
