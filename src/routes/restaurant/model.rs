use serde::Deserialize;

use crate::error::AppError;
use crate::models::NewRestaurant;
use crate::utils::{parse_int_field, required_field};

const MAX_RATING: i32 = 5;

/// 新建餐厅表单，所有字段必填
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub opening_hours: Option<String>,
    pub cuisine_type: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<String>,
}

impl TryFrom<RestaurantForm> for NewRestaurant {
    type Error = AppError;

    fn try_from(form: RestaurantForm) -> Result<Self, Self::Error> {
        let rating = parse_int_field(form.rating, "rating")?;
        if !(0..=MAX_RATING).contains(&rating) {
            return Err(AppError::validation(format!(
                "rating must be between 0 and {}",
                MAX_RATING
            )));
        }

        Ok(NewRestaurant {
            name: required_field(form.name, "name")?,
            description: required_field(form.description, "description")?,
            address: required_field(form.address, "address")?,
            phone: required_field(form.phone, "phone")?,
            opening_hours: required_field(form.opening_hours, "openingHours")?,
            cuisine_type: required_field(form.cuisine_type, "cuisineType")?,
            price_range: required_field(form.price_range, "priceRange")?,
            rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RestaurantForm {
        RestaurantForm {
            name: Some("Golden Wok".into()),
            description: Some("Cantonese classics".into()),
            address: Some("12 Harbour Rd".into()),
            phone: Some("555-0101".into()),
            opening_hours: Some("11:00-22:00".into()),
            cuisine_type: Some("Cantonese".into()),
            price_range: Some("$$".into()),
            rating: Some("4".into()),
        }
    }

    #[test]
    fn complete_form_is_accepted() {
        let new = NewRestaurant::try_from(form()).unwrap();
        assert_eq!(new.name, "Golden Wok");
        assert_eq!(new.rating, 4);
    }

    #[test]
    fn rating_out_of_range_or_blank_field_rejected() {
        let mut f = form();
        f.rating = Some("6".into());
        assert!(NewRestaurant::try_from(f).is_err());

        let mut f = form();
        f.rating = Some("-1".into());
        assert!(NewRestaurant::try_from(f).is_err());

        let mut f = form();
        f.phone = Some("  ".into());
        assert!(NewRestaurant::try_from(f).is_err());
    }
}
