use crate::aggregate::LandslideOutputs;
use crate::config::{RechargeSource, SourceShare};
use crate::fields::{FieldAccessor, NodeFields};
use anyhow::{Context, Result, anyhow, bail};
use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

const NODE_COLUMN: &str = "node";
const CORE_COLUMN: &str = "core";

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn parse_f64(record: &StringRecord, index: usize, column: &str, row: usize) -> Result<f64> {
    let raw = record
        .get(index)
        .ok_or_else(|| anyhow!("row {} has no {} column", row, column))?;
    raw.parse::<f64>()
        .with_context(|| format!("row {}: invalid {} value {:?}", row, column, raw))
}

/// Read a node table: one row per node, one column per field.
///
/// A `node` column, if present, must count up from 0. A `core` column of 0/1
/// becomes the core-node mask.
pub fn read_node_fields<R: Read>(input: R) -> Result<NodeFields> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut rows = 0;
    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("failed to read row {}", row))?;
        for (index, name) in headers.iter().enumerate() {
            columns[index].push(parse_f64(&record, index, name, row)?);
        }
        rows += 1;
    }

    let mut fields = NodeFields::new(rows);
    for (name, values) in headers.iter().zip(columns) {
        match name {
            NODE_COLUMN => {
                for (row, &id) in values.iter().enumerate() {
                    if id != row as f64 {
                        bail!("node ids must be consecutive from 0, found {} at row {}", id, row);
                    }
                }
            }
            CORE_COLUMN => {
                let mask = values.iter().map(|&flag| flag != 0.0).collect();
                fields = fields.with_core_mask(mask)?;
            }
            _ => fields.set_field(name, values)?,
        }
    }
    Ok(fields)
}

pub fn load_node_fields(path: &Path) -> Result<NodeFields> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    read_node_fields(BufReader::new(file)).with_context(|| format!("failed to parse {:?}", path))
}

// Observed recharge records as `source_id,recharge` rows, grouped by source
pub fn read_recharge_sources<R: Read>(input: R) -> Result<Vec<RechargeSource>> {
    let mut rdr = reader(input);
    let mut sources: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let id = record
            .get(0)
            .ok_or_else(|| anyhow!("row {} has no source id", row))?
            .parse::<u32>()
            .with_context(|| format!("row {}: invalid source id", row))?;
        let recharge = parse_f64(&record, 1, "recharge", row)?;
        sources.entry(id).or_default().push(recharge);
    }
    Ok(sources
        .into_iter()
        .map(|(id, records)| RechargeSource { id, records })
        .collect())
}

// Source shares as `node,source_id,fraction` rows
pub fn read_node_source_shares<R: Read>(
    input: R,
    node_count: usize,
) -> Result<Vec<Vec<SourceShare>>> {
    let mut rdr = reader(input);
    let mut shares = vec![Vec::new(); node_count];
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let node = record
            .get(0)
            .ok_or_else(|| anyhow!("row {} has no node", row))?
            .parse::<usize>()
            .with_context(|| format!("row {}: invalid node", row))?;
        let source = record
            .get(1)
            .ok_or_else(|| anyhow!("row {} has no source id", row))?
            .parse::<u32>()
            .with_context(|| format!("row {}: invalid source id", row))?;
        let fraction = parse_f64(&record, 2, "fraction", row)?;
        let node_shares = shares
            .get_mut(node)
            .ok_or_else(|| anyhow!("row {}: node {} is outside the grid", row, node))?;
        node_shares.push(SourceShare { source, fraction });
    }
    Ok(shares)
}

pub fn load_recharge_sources(path: &Path) -> Result<Vec<RechargeSource>> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let sources = read_recharge_sources(BufReader::new(file))?;
    println!("Loaded {} recharge sources from {:?}", sources.len(), path);
    Ok(sources)
}

pub fn load_node_source_shares(path: &Path, node_count: usize) -> Result<Vec<Vec<SourceShare>>> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    read_node_source_shares(BufReader::new(file), node_count)
}

pub fn write_outputs<W: Write>(wtr: &mut Writer<W>, outputs: &LandslideOutputs) -> Result<()> {
    let columns = outputs.fields();
    let mut header = vec![NODE_COLUMN];
    header.extend(columns.iter().map(|(name, _)| *name));
    wtr.write_record(&header)?;

    for node in 0..outputs.node_count() {
        let mut record = vec![node.to_string()];
        record.extend(columns.iter().map(|(_, values)| values[node].to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn create_csv_writer(path: &Path) -> Result<Writer<File>> {
    WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to create {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[test]
    fn node_table_becomes_fields_with_core_mask() {
        let table = "\
node,core,topographic__slope,soil__density
0,0,0.1,2000
1,1,0.5,1900
2,0,0.2,2100
";
        let grid = read_node_fields(table.as_bytes()).unwrap();
        assert_eq!(grid.node_count(), 3);
        assert_eq!(grid.core_nodes(), vec![1]);
        assert_eq!(grid.get_field(fields::SLOPE).unwrap(), &[0.1, 0.5, 0.2]);
        assert!(!grid.has_field("node"));
        assert!(!grid.has_field("core"));
    }

    #[test]
    fn unparseable_cells_report_row_and_column() {
        let table = "topographic__slope\n0.1\nsteep\n";
        let err = read_node_fields(table.as_bytes()).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("row 1"), "{}", message);
        assert!(message.contains("topographic__slope"), "{}", message);
    }

    #[test]
    fn recharge_sources_are_grouped_by_id() {
        let table = "source_id,recharge\n2,10\n1,30\n2,15\n";
        let sources = read_recharge_sources(table.as_bytes()).unwrap();
        assert_eq!(
            sources,
            vec![
                RechargeSource {
                    id: 1,
                    records: vec![30.0]
                },
                RechargeSource {
                    id: 2,
                    records: vec![10.0, 15.0]
                },
            ]
        );
    }

    #[test]
    fn node_shares_outside_grid_are_rejected() {
        let table = "node,source_id,fraction\n0,1,0.5\n0,2,0.5\n";
        let shares = read_node_source_shares(table.as_bytes(), 2).unwrap();
        assert_eq!(shares[0].len(), 2);
        assert!(shares[1].is_empty());

        let table = "node,source_id,fraction\n5,1,1.0\n";
        assert!(read_node_source_shares(table.as_bytes(), 2).is_err());
    }

    #[test]
    fn outputs_are_written_one_row_per_node() {
        let outputs = LandslideOutputs {
            probability_of_failure: vec![1.0, 0.25],
            mean_relative_wetness: vec![0.5, 0.75],
            probability_of_saturation: vec![0.0, 0.5],
        };
        let mut wtr = WriterBuilder::new().from_writer(Vec::new());
        write_outputs(&mut wtr, &outputs).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "node,landslide__probability_of_failure,soil__mean_relative_wetness,soil__probability_of_saturation\n\
             0,1,0.5,0\n\
             1,0.25,0.75,0.5\n"
        );
    }
}
