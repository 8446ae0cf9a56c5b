//! Binding and validation of the item add and edit forms.

use super::item_repository::{Item, NewItem};
use crate::infra::validation::FormErrors;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// The smallest accepted value of `price * quantity`.
pub const MIN_TOTAL_PRICE: i64 = 10_000;

/// The item form as submitted by the browser.
///
/// Every field is kept as text so that the form can be shown again exactly
/// as it was entered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemForm {
    /// The item's name.
    pub item_name: String,
    /// The price of a single unit.
    pub price: String,
    /// The number of units.
    pub quantity: String,
}

impl From<&Item> for ItemForm {
    fn from(item: &Item) -> Self {
        Self {
            item_name: item.name.clone(),
            price: item.price.to_string(),
            quantity: item.quantity.to_string(),
        }
    }
}

/// Input for adding an item.
#[derive(Clone, Debug, PartialEq, Eq, Validate)]
pub struct ItemSaveDto {
    /// Checked by [`check_not_blank`], which ignores surrounding whitespace.
    pub item_name: String,
    #[validate(
        required(message = "must not be empty"),
        range(min = 1000, max = 1000000, message = "must be between 1000 and 1000000")
    )]
    pub price: Option<i32>,
    #[validate(
        required(message = "must not be empty"),
        range(max = 9999, message = "must be at most 9999")
    )]
    pub quantity: Option<i32>,
}

/// Input for editing an item. The quantity has no upper bound here.
#[derive(Clone, Debug, PartialEq, Eq, Validate)]
pub struct ItemUpdateDto {
    /// Checked by [`check_not_blank`], which ignores surrounding whitespace.
    pub item_name: String,
    #[validate(
        required(message = "must not be empty"),
        range(min = 1000, max = 1000000, message = "must be between 1000 and 1000000")
    )]
    pub price: Option<i32>,
    #[validate(required(message = "must not be empty"))]
    pub quantity: Option<i32>,
}

/// The typed values of a form, before constraints are checked.
struct Bound {
    item_name: String,
    price: Option<i32>,
    quantity: Option<i32>,
}

/// Converts the raw text of a form into typed values.
///
/// Blank numbers become `None`, unparsable numbers become `None` plus a
/// `typeMismatch` error.
fn bind(form: &ItemForm, errors: &mut FormErrors) -> Bound {
    Bound {
        item_name: form.item_name.clone(),
        price: bind_number("price", &form.price, errors),
        quantity: bind_number("quantity", &form.quantity, errors),
    }
}

fn bind_number(field: &str, text: &str, errors: &mut FormErrors) -> Option<i32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            errors.reject_field(field, "typeMismatch", "must be a number");
            None
        }
    }
}

/// Rejects a name that is empty or only whitespace. The name itself is kept
/// as entered.
pub fn check_not_blank(item_name: &str, errors: &mut FormErrors) {
    if item_name.trim().is_empty() {
        errors.reject_field("item_name", "notBlank", "must not be blank");
    }
}

/// Rejects the form when `price * quantity` is below [`MIN_TOTAL_PRICE`].
///
/// Nothing is checked unless both values are present.
pub fn check_total_price(price: Option<i32>, quantity: Option<i32>, errors: &mut FormErrors) {
    if let (Some(price), Some(quantity)) = (price, quantity) {
        let total = i64::from(price) * i64::from(quantity);
        if total < MIN_TOTAL_PRICE {
            errors.reject("totalPriceMin", vec![MIN_TOTAL_PRICE, total]);
        }
    }
}

/// Validates an add form, returning the item to save or every error found.
pub fn validate_save(form: &ItemForm) -> Result<NewItem, FormErrors> {
    let mut errors = FormErrors::new();
    let bound = bind(form, &mut errors);
    let dto = ItemSaveDto {
        item_name: bound.item_name,
        price: bound.price,
        quantity: bound.quantity,
    };
    check_not_blank(&dto.item_name, &mut errors);
    if let Err(e) = dto.validate() {
        errors.add_validation_errors(&e);
    }
    check_total_price(dto.price, dto.quantity, &mut errors);
    into_new_item(dto.item_name, dto.price, dto.quantity, errors)
}

/// Validates an edit form, returning the replacement fields or every error found.
pub fn validate_update(form: &ItemForm) -> Result<NewItem, FormErrors> {
    let mut errors = FormErrors::new();
    let bound = bind(form, &mut errors);
    let dto = ItemUpdateDto {
        item_name: bound.item_name,
        price: bound.price,
        quantity: bound.quantity,
    };
    check_not_blank(&dto.item_name, &mut errors);
    if let Err(e) = dto.validate() {
        errors.add_validation_errors(&e);
    }
    check_total_price(dto.price, dto.quantity, &mut errors);
    into_new_item(dto.item_name, dto.price, dto.quantity, errors)
}

fn into_new_item(
    name: String,
    price: Option<i32>,
    quantity: Option<i32>,
    errors: FormErrors,
) -> Result<NewItem, FormErrors> {
    match (price, quantity) {
        (Some(price), Some(quantity)) if !errors.has_errors() => Ok(NewItem {
            name,
            price,
            quantity,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, price: &str, quantity: &str) -> ItemForm {
        ItemForm {
            item_name: name.to_string(),
            price: price.to_string(),
            quantity: quantity.to_string(),
        }
    }

    #[test]
    fn low_total_is_rejected_with_args() {
        let errors = validate_save(&form("itemA", "1000", "1")).unwrap_err();
        assert_eq!(1, errors.global_errors().len());
        assert_eq!("totalPriceMin", errors.global_errors()[0].code);
        assert_eq!(vec![10000, 1000], errors.global_errors()[0].args);
        assert!(!errors.has_field_errors("price"));
    }

    #[test]
    fn price_100_quantity_1_is_rejected() {
        let errors = validate_save(&form("itemA", "100", "1")).unwrap_err();
        assert_eq!(vec![10000, 100], errors.global_errors()[0].args);
        assert_eq!("range", errors.field_errors("price")[0].code);
    }

    #[test]
    fn total_of_exactly_10000_is_accepted() {
        let item = validate_save(&form("itemA", "10000", "1")).unwrap();
        assert_eq!(
            NewItem {
                name: "itemA".to_string(),
                price: 10000,
                quantity: 1,
            },
            item
        );
    }

    #[test]
    fn totals_around_the_limit() {
        for (price, quantity, accepted) in [
            (1000, 9, false),
            (1000, 10, true),
            (9999, 1, false),
            (5000, 2, true),
            (3333, 3, false),
        ] {
            let result = validate_save(&form("itemA", &price.to_string(), &quantity.to_string()));
            assert_eq!(accepted, result.is_ok(), "{price} * {quantity}");
        }
    }

    #[test]
    fn total_check_skips_missing_values() {
        let mut errors = FormErrors::new();
        check_total_price(Some(1), None, &mut errors);
        check_total_price(None, Some(1), &mut errors);
        assert!(!errors.has_errors());
    }

    #[test]
    fn total_does_not_overflow() {
        let mut errors = FormErrors::new();
        check_total_price(Some(i32::MAX), Some(i32::MAX), &mut errors);
        assert!(!errors.has_errors());
    }

    #[test]
    fn blank_name_and_missing_numbers_are_field_errors() {
        let errors = validate_save(&form("   ", "", "")).unwrap_err();
        assert!(errors.has_field_errors("item_name"));
        assert_eq!("required", errors.field_errors("price")[0].code);
        assert_eq!("required", errors.field_errors("quantity")[0].code);
        assert!(errors.global_errors().is_empty());
    }

    #[test]
    fn unparsable_price_is_a_type_mismatch() {
        let errors = validate_save(&form("itemA", "abc", "10")).unwrap_err();
        assert_eq!(1, errors.field_errors("price").len());
        assert_eq!("typeMismatch", errors.field_errors("price")[0].code);
        assert!(errors.global_errors().is_empty());
    }

    #[test]
    fn save_limits_quantity_but_update_does_not() {
        let errors = validate_save(&form("itemA", "10000", "10000")).unwrap_err();
        assert_eq!("range", errors.field_errors("quantity")[0].code);

        let item = validate_update(&form("itemA", "10000", "10000")).unwrap();
        assert_eq!(10000, item.quantity);
    }

    #[test]
    fn update_applies_the_total_rule() {
        let errors = validate_update(&form("itemA", "1000", "2")).unwrap_err();
        assert_eq!(vec![10000, 2000], errors.global_errors()[0].args);
    }

    #[test]
    fn name_is_kept_as_entered() {
        let item = validate_save(&form("  itemA ", "10000", "1")).unwrap();
        assert_eq!("  itemA ", item.name);

        let item = validate_update(&form(" itemB", "10000", "1")).unwrap();
        assert_eq!(" itemB", item.name);
    }

    #[test]
    fn whitespace_name_is_blank() {
        for name in ["", " ", "\t \n"] {
            let errors = validate_update(&form(name, "10000", "1")).unwrap_err();
            assert_eq!("notBlank", errors.field_errors("item_name")[0].code);
            assert_eq!(1, errors.field_errors("item_name").len());
        }
    }
}
