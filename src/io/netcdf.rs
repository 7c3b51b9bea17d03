use crate::aggregate::LandslideOutputs;
use crate::config::LandslideConfig;
use crate::fields;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

const FILL_VALUE: f64 = -9999.0;

// Write the output fields over a single `node` dimension
pub fn write_netcdf_output(
    path: &Path,
    outputs: &LandslideOutputs,
    config: &LandslideConfig,
) -> Result<()> {
    let mut file =
        netcdf::create(path).with_context(|| format!("failed to create NetCDF file {:?}", path))?;

    file.add_dimension("node", outputs.node_count())?;

    let node_ids: Vec<i64> = (0..outputs.node_count() as i64).collect();
    let mut node_var = file.add_variable::<i64>("node", &["node"])?;
    node_var.put_attribute("long_name", "Node index")?;
    node_var.put_values(&node_ids, ..)?;

    for (name, values) in outputs.fields() {
        let mut var = file.add_variable::<f64>(name, &["node"])?;
        var.put_attribute("_FillValue", FILL_VALUE)?;
        var.put_attribute("missing_value", FILL_VALUE)?;
        if let Some(spec) = fields::field_spec(name) {
            var.put_attribute("long_name", spec.description)?;
            var.put_attribute("units", spec.units)?;
        }
        var.put_values(values, ..)?;
    }

    // Global attributes
    file.add_attribute("TITLE", "OUTPUT FROM LANDSLIDE_RS")?;
    file.add_attribute(
        "date_created",
        Utc::now().format("%Y-%m-%d_%H:%M:%S").to_string(),
    )?;
    file.add_attribute("number_of_iterations", config.number_of_iterations as i64)?;
    file.add_attribute(
        "groundwater__recharge_distribution",
        config.recharge.kind(),
    )?;
    file.add_attribute("seed", config.seed as i64)?;
    file.add_attribute("code_version", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
