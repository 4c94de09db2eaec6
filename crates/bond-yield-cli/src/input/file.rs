use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a JSON or YAML input file and deserialise into a typed struct.
/// `.yaml` / `.yml` files are parsed as YAML, everything else as JSON.
pub fn read_input<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let is_yaml = matches!(
        canonical.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: T = if is_yaml {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    };
    Ok(value)
}

/// Resolve and validate the path.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bond_yield_core::bond::{BondInputs, CouponFrequency};

    fn demo(name: &str) -> String {
        format!("{}/../../demos/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn test_reads_json_demo() {
        let inputs: BondInputs = read_input(&demo("discount_bond.json")).unwrap();
        assert_eq!(inputs.frequency, CouponFrequency::SemiAnnual);
        assert!(!inputs.solver.strict);
    }

    #[test]
    fn test_reads_yaml_demo() {
        let inputs: BondInputs = read_input(&demo("premium_bond_strict.yaml")).unwrap();
        assert_eq!(inputs.frequency, CouponFrequency::Annual);
        assert!(inputs.solver.strict);
        assert_eq!(inputs.solver.max_iterations, 50);
    }

    #[test]
    fn test_missing_file() {
        let err = read_input::<BondInputs>(&demo("nope.json")).unwrap_err();
        assert!(err.to_string().starts_with("File not found"));
    }
}
