use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub address: String,
    pub phone: String,
    pub opening_hours: String,
    pub cuisine_type: String,
    pub price_range: String,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRestaurant {
    pub name: String,
    pub description: String,
    pub address: String,
    pub phone: String,
    pub opening_hours: String,
    pub cuisine_type: String,
    pub price_range: String,
    pub rating: i32,
}

impl NewRestaurant {
    pub fn into_restaurant(self, id: Uuid) -> Restaurant {
        Restaurant {
            id,
            name: self.name,
            description: self.description,
            address: self.address,
            phone: self.phone,
            opening_hours: self.opening_hours,
            cuisine_type: self.cuisine_type,
            price_range: self.price_range,
            rating: self.rating,
        }
    }
}
