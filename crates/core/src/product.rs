use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::hlc::Hlc;
use crate::ids::ProductId;
use crate::record::{Record, Validate, optional_text, require_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub is_active: bool,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDraft {
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<Option<String>>,
    pub unit: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

impl Record for Product {
    const TABLE: &'static str = "products";

    type Id = ProductId;
    type Draft = ProductDraft;
    type Patch = ProductPatch;
    type Filter = ProductFilter;

    fn id(&self) -> ProductId {
        self.id
    }
}

impl Validate for ProductDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("code", &self.code)?;
        require_text("name", &self.name)
    }
}

impl Validate for ProductPatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("code", self.code.as_deref())?;
        optional_text("name", self.name.as_deref())
    }
}
