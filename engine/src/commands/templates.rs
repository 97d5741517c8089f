use entity::template;

use crate::error::EngineError;
use crate::renderer::extract_variables;
use crate::store::{NewTemplate, Store};

#[derive(Debug, Clone)]
pub struct CreateTemplateCmd {
    pub user_id: i32,
    pub name: String,
    pub subject: String,
    pub body: String,
}

/// `CreateTemplate` (§6): the variable set is always recomputed from the
/// submitted subject/body, never taken from caller input, per §3's
/// invariant that the declared list is advisory and derived on write.
pub async fn create_template(store: &Store, cmd: CreateTemplateCmd) -> Result<template::Model, EngineError> {
    let variables = extract_variables(&cmd.subject, &cmd.body);

    store
        .create_template(NewTemplate {
            user_id: cmd.user_id,
            name: cmd.name,
            subject: cmd.subject,
            body: cmd.body,
            variables,
        })
        .await
}
