use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ftd_core::utils::get_dynamic_reader;

use crate::consts::NO_PRIOR_MARKER;
use crate::errors::ModelError;
use crate::models::dispersion::{DispersionModel, NegativeBinomialModel};
use crate::models::prior::BetaPrior;

///
/// One row of the metadata table:
/// `id  dispersion_model_path  count_store_path  beta_prior_path|!`
///
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetMetadata {
    pub id: String,
    pub dispersion_model: PathBuf,
    pub count_store: PathBuf,
    pub beta_prior: Option<PathBuf>,
}

impl DatasetMetadata {
    fn parse(line: &str, line_no: usize) -> Result<Self, ModelError> {
        let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();

        if fields.len() < 3 || fields.len() > 4 {
            return Err(ModelError::MalformedMetadata {
                line: line_no,
                reason: format!("expected 3 or 4 tab-separated fields, found {}", fields.len()),
            });
        }
        if fields[..3].iter().any(|f| f.is_empty()) {
            return Err(ModelError::MalformedMetadata {
                line: line_no,
                reason: "empty field".to_string(),
            });
        }

        let beta_prior = fields
            .get(3)
            .filter(|p| !p.is_empty() && **p != NO_PRIOR_MARKER)
            .map(|p| PathBuf::from(*p));

        Ok(DatasetMetadata {
            id: fields[0].to_string(),
            dispersion_model: PathBuf::from(fields[1]),
            count_store: PathBuf::from(fields[2]),
            beta_prior,
        })
    }
}

///
/// Read the metadata table, skipping `#` comments and blank lines.
///
pub fn read_metadata(path: &Path) -> Result<Vec<DatasetMetadata>, ModelError> {
    let reader = get_dynamic_reader(path)
        .map_err(|e| ModelError::MetadataRead(format!("{}: {:#}", path.display(), e)))?;

    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        rows.push(DatasetMetadata::parse(&line, idx + 1)?);
    }

    if rows.is_empty() {
        return Err(ModelError::EmptyMetadata(path.display().to_string()));
    }

    Ok(rows)
}

///
/// Per-dataset models and priors, loaded once and shared read-only by all
/// processors. Index `d` of every vector refers to the same dataset, in
/// metadata row order.
///
#[derive(Clone)]
pub struct ModelRegistry {
    ids: Vec<String>,
    count_stores: Vec<PathBuf>,
    models: Vec<Arc<dyn DispersionModel>>,
    priors: Vec<BetaPrior>,
}

impl ModelRegistry {
    ///
    /// Validate every path and load every model and prior. Any missing file
    /// or unparsable model aborts the whole load.
    ///
    pub fn load(rows: &[DatasetMetadata]) -> Result<Self, ModelError> {
        let mut ids = Vec::with_capacity(rows.len());
        let mut count_stores = Vec::with_capacity(rows.len());
        let mut models: Vec<Arc<dyn DispersionModel>> = Vec::with_capacity(rows.len());
        let mut priors = Vec::with_capacity(rows.len());

        for row in rows {
            require_file(&row.id, "Count store", &row.count_store)?;
            require_file(&row.id, "Dispersion model", &row.dispersion_model)?;

            let prior = match &row.beta_prior {
                Some(path) => {
                    require_file(&row.id, "Beta prior", path)?;
                    BetaPrior::from_file(path)?
                }
                None => BetaPrior::default(),
            };

            let model = NegativeBinomialModel::from_json_file(&row.dispersion_model)?;
            log::debug!(
                "Loaded dataset '{}' (prior alpha={}, beta={})",
                row.id,
                prior.alpha,
                prior.beta
            );

            ids.push(row.id.clone());
            count_stores.push(row.count_store.clone());
            models.push(Arc::new(model));
            priors.push(prior);
        }

        Ok(ModelRegistry {
            ids,
            count_stores,
            models,
            priors,
        })
    }

    ///
    /// Build a registry from already constructed models.
    ///
    pub fn from_parts(
        ids: Vec<String>,
        models: Vec<Arc<dyn DispersionModel>>,
        priors: Vec<BetaPrior>,
    ) -> Self {
        ModelRegistry {
            count_stores: Vec::new(),
            ids,
            models,
            priors,
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn count_stores(&self) -> &[PathBuf] {
        &self.count_stores
    }

    pub fn model(&self, dataset: usize) -> &dyn DispersionModel {
        self.models[dataset].as_ref()
    }

    pub fn priors(&self) -> &[BetaPrior] {
        &self.priors
    }
}

fn require_file(dataset: &str, kind: &'static str, path: &Path) -> Result<(), ModelError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ModelError::MissingFile {
            dataset: dataset.to_string(),
            kind,
            path: path.to_owned(),
        })
    }
}
