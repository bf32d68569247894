//! The operation request as received from clients.

use serde::{Deserialize, Serialize};

use openrs_common::{BandFileIds, BandRole, ExtraParams, FileId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    #[serde(flatten)]
    pub bands: BandFileIds,
    /// Generic single-band GeoTIFF, loaded under the `tif` role.
    #[serde(default)]
    pub tif_file: Option<FileId>,
    pub operation_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub extra_params: ExtraParams,
}

impl OperationRequest {
    pub fn new(operation_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            operation_type: operation_type.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_band(mut self, role: BandRole, file_id: FileId) -> Self {
        match role {
            BandRole::Tif => self.tif_file = Some(file_id),
            _ => self.bands.set(role, Some(file_id)),
        }
        self
    }

    pub fn with_params(mut self, params: ExtraParams) -> Self {
        self.extra_params = params;
        self
    }

    /// Every supplied `(role, file id)` in role order.
    pub fn file_ids(&self) -> Vec<(BandRole, FileId)> {
        BandRole::ALL
            .iter()
            .filter_map(|role| {
                let id = match role {
                    BandRole::Tif => self.tif_file,
                    _ => self.bands.get(*role),
                };
                id.map(|id| (*role, id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_client_payload() {
        let request: OperationRequest = serde_json::from_str(
            r#"{"red_band": 4, "nir": 9, "operation_type": "ndvi", "title": "Field",
                "extra_params": {"x": 1}}"#,
        )
        .unwrap();
        assert_eq!(request.file_ids(), vec![(BandRole::Red, 4), (BandRole::Nir, 9)]);
        assert_eq!(request.extra_params.get("x"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_tif_file_is_listed_last() {
        let request = OperationRequest::new("float_image", "t")
            .with_band(BandRole::Tif, 3)
            .with_band(BandRole::Blue, 1);
        assert_eq!(request.file_ids(), vec![(BandRole::Blue, 1), (BandRole::Tif, 3)]);
    }
}
