//! HTML views for listing, adding and editing items.
//!
//! Submitted forms go through [`item_form`] first. A form with errors is
//! rendered again with the errors attached; a valid form is persisted and the
//! browser is redirected to the item's page.

use super::{
    item_form::{self, ItemForm},
    item_repository::{DynItemStore, Item},
};
use crate::infra::{
    error::{ApiResult, ClientError},
    extract::{Form, Query},
    state::AppState,
    validation::FormErrors,
};
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Router,
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use tracing::instrument;

/// The item view endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .typed_get(list_items)
        .typed_get(render_add_form)
        .typed_post(submit_add)
        .typed_get(get_item)
        .typed_get(render_edit_form)
        .typed_post(submit_edit)
}

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/items", rejection(ClientError))]
pub struct ItemsPath;

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/items/add", rejection(ClientError))]
pub struct AddItemPath;

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/items/:item_id", rejection(ClientError))]
pub struct ItemPath {
    pub item_id: i64,
}

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/items/:item_id/edit", rejection(ClientError))]
pub struct EditItemPath {
    pub item_id: i64,
}

#[derive(Template)]
#[template(path = "items/list.html")]
pub struct ItemsTemplate {
    items: Vec<Item>,
}

#[derive(Template)]
#[template(path = "items/detail.html")]
pub struct ItemTemplate {
    item: Item,
    saved: bool,
}

#[derive(Template)]
#[template(path = "items/add_form.html")]
pub struct AddFormTemplate {
    form: ItemForm,
    errors: FormErrors,
}

#[derive(Template)]
#[template(path = "items/edit_form.html")]
pub struct EditFormTemplate {
    item_id: i64,
    form: ItemForm,
    errors: FormErrors,
}

/// Query parameters of the item page.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ItemParams {
    /// `true` after a successful save, so that the page can confirm it.
    /// Any other value is accepted and ignored.
    status: Option<String>,
}

impl ItemParams {
    fn saved(&self) -> bool {
        self.status.as_deref() == Some("true")
    }
}

/// Lists all items.
#[instrument(skip_all)]
async fn list_items(_: ItemsPath, State(items): State<DynItemStore>) -> ApiResult<ItemsTemplate> {
    let items = items.find_all().await?;
    Ok(ItemsTemplate { items })
}

/// Shows a single item.
#[instrument(skip(items))]
async fn get_item(
    ItemPath { item_id }: ItemPath,
    State(items): State<DynItemStore>,
    Query(params): Query<ItemParams>,
) -> ApiResult<ItemTemplate> {
    let item = items
        .find_by_id(item_id)
        .await?
        .ok_or(ClientError::NotFound)?;
    Ok(ItemTemplate {
        item,
        saved: params.saved(),
    })
}

/// Shows an empty add form.
#[instrument(skip_all)]
async fn render_add_form(_: AddItemPath) -> AddFormTemplate {
    AddFormTemplate {
        form: ItemForm::default(),
        errors: FormErrors::new(),
    }
}

/// Adds an item, or shows the form again if it has errors.
#[instrument(skip_all)]
async fn submit_add(
    _: AddItemPath,
    State(items): State<DynItemStore>,
    Form(form): Form<ItemForm>,
) -> ApiResult<Response> {
    let new_item = match item_form::validate_save(&form) {
        Ok(new_item) => new_item,
        Err(errors) => {
            tracing::warn!("errors = {:?}", errors);
            return Ok(AddFormTemplate { form, errors }.into_response());
        }
    };

    let item = items.save(new_item).await?;
    let location = format!("{}?status=true", ItemPath { item_id: item.id });
    Ok(Redirect::to(&location).into_response())
}

/// Shows the edit form of an item.
#[instrument(skip(items))]
async fn render_edit_form(
    EditItemPath { item_id }: EditItemPath,
    State(items): State<DynItemStore>,
) -> ApiResult<EditFormTemplate> {
    let item = items
        .find_by_id(item_id)
        .await?
        .ok_or(ClientError::NotFound)?;
    Ok(EditFormTemplate {
        item_id,
        form: ItemForm::from(&item),
        errors: FormErrors::new(),
    })
}

/// Overwrites an item, or shows the form again if it has errors.
#[instrument(skip(items, form))]
async fn submit_edit(
    EditItemPath { item_id }: EditItemPath,
    State(items): State<DynItemStore>,
    Form(form): Form<ItemForm>,
) -> ApiResult<Response> {
    let new_item = match item_form::validate_update(&form) {
        Ok(new_item) => new_item,
        Err(errors) => {
            tracing::warn!("errors = {:?}", errors);
            return Ok(EditFormTemplate {
                item_id,
                form,
                errors,
            }
            .into_response());
        }
    };

    items.update(item_id, new_item).await?;
    Ok(Redirect::to(&ItemPath { item_id }.to_string()).into_response())
}
