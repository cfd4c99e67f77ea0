use std::sync::Arc;

use crate::api::upload::{FileUpload, MultipartForm};
use crate::api::{ApiClient, endpoints};
use crate::error::ClientError;
use crate::models::driver::{DriverProfile, DriverProfileResponse};
use crate::models::user::User;
use crate::observability::metrics::Metrics;
use crate::store::resource::{Operation, ResourceStore, Sequencing};

const BECOME_DRIVER: Operation = Operation::write("become_driver", "Error onboarding driver");
const FETCH_PROFILE: Operation = Operation::read("fetch_profile", "Error fetching profile");
const UPLOAD_DOCUMENTS: Operation =
    Operation::write("upload_documents", "Error uploading documents");
const UPDATE_PROFILE: Operation =
    Operation::write("update_profile", "Error updating driver profile");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverState {
    pub profile: Option<DriverProfile>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default)]
pub struct VehicleDetails {
    pub car_make: String,
    pub car_model: String,
    pub car_year: String,
    pub license_plate: String,
    pub available_seats: u32,
    pub bio: String,
    pub experience: String,
    /// Comma separated, as typed into the form.
    pub preferred_routes: String,
}

impl VehicleDetails {
    fn routes(&self) -> Vec<String> {
        self.preferred_routes
            .split(',')
            .map(str::trim)
            .filter(|route| !route.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn text_fields(&self, form: MultipartForm) -> MultipartForm {
        form.text("carMake", &self.car_make)
            .text("carModel", &self.car_model)
            .text("carYear", &self.car_year)
            .text("licensePlate", &self.license_plate)
            .text("availableSeats", self.available_seats.to_string())
            .text("bio", &self.bio)
            .text("experience", &self.experience)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DriverOnboarding {
    pub vehicle: VehicleDetails,
    pub profile_photo: Option<FileUpload>,
    pub driver_license_image: Option<FileUpload>,
}

impl DriverOnboarding {
    /// Routes go out as repeated `preferredRoutes[]` entries.
    pub fn into_multipart(self) -> MultipartForm {
        let routes = self.vehicle.routes();
        let form = self.vehicle.text_fields(MultipartForm::new());
        routes
            .into_iter()
            .fold(form, |form, route| form.text("preferredRoutes[]", route))
            .maybe_file("profilePhoto", self.profile_photo)
            .maybe_file("driverLicenseImage", self.driver_license_image)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DriverProfileUpdate {
    pub vehicle: VehicleDetails,
    pub profile_photo: Option<FileUpload>,
    pub driver_license_image: Option<FileUpload>,
}

impl DriverProfileUpdate {
    /// Prefills the edit form from the held profile.
    pub fn from_profile(profile: &DriverProfile) -> Self {
        Self {
            vehicle: VehicleDetails {
                car_make: profile.car_make.clone().unwrap_or_default(),
                car_model: profile.car_model.clone().unwrap_or_default(),
                car_year: profile.car_year().unwrap_or_default(),
                license_plate: profile.license_plate.clone().unwrap_or_default(),
                available_seats: profile.available_seats.unwrap_or_default(),
                bio: profile.bio.clone().unwrap_or_default(),
                experience: profile.experience.clone().unwrap_or_default(),
                preferred_routes: profile.preferred_routes.join(", "),
            },
            profile_photo: None,
            driver_license_image: None,
        }
    }

    /// Routes go out as a single comma-joined field.
    pub fn into_multipart(self) -> MultipartForm {
        let routes = self.vehicle.routes().join(",");
        self.vehicle
            .text_fields(MultipartForm::new())
            .text("preferredRoutes", routes)
            .maybe_file("profilePhoto", self.profile_photo)
            .maybe_file("driverLicenseImage", self.driver_license_image)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentUpload {
    pub profile_photo: Option<FileUpload>,
    pub driver_license_image: Option<FileUpload>,
}

impl DocumentUpload {
    pub fn into_multipart(self) -> Result<MultipartForm, ClientError> {
        if self.profile_photo.is_none() && self.driver_license_image.is_none() {
            return Err(ClientError::Validation(
                "Select at least one document to upload".to_string(),
            ));
        }
        Ok(MultipartForm::new()
            .maybe_file("profilePhoto", self.profile_photo)
            .maybe_file("driverLicenseImage", self.driver_license_image))
    }
}

/// The signed-in driver's own profile.
#[derive(Clone)]
pub struct DriverStore {
    api: ApiClient,
    store: Arc<ResourceStore<DriverState>>,
}

impl DriverStore {
    pub fn new(api: ApiClient, sequencing: Sequencing, metrics: Metrics) -> Self {
        Self {
            api,
            store: Arc::new(ResourceStore::new(
                "driver",
                DriverState::default(),
                sequencing,
                metrics,
            )),
        }
    }

    pub fn store(&self) -> Arc<ResourceStore<DriverState>> {
        self.store.clone()
    }

    pub fn profile(&self) -> Option<DriverProfile> {
        self.store.read(|state| state.profile.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.store.read(|state| state.user.clone())
    }

    pub async fn become_driver(
        &self,
        onboarding: DriverOnboarding,
    ) -> Result<DriverProfileResponse, ClientError> {
        let api = self.api.clone();
        let form = onboarding.into_multipart();
        self.store
            .run(
                BECOME_DRIVER,
                async move { api.post_multipart(endpoints::DRIVER_BECOME, form).await },
                |state, response: &DriverProfileResponse| {
                    state.profile = response.driver_profile.clone();
                    Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "Driver profile submitted successfully".to_string()),
                    )
                },
            )
            .await
    }

    pub async fn fetch_profile(&self) -> Result<DriverProfileResponse, ClientError> {
        let api = self.api.clone();
        self.store
            .run(
                FETCH_PROFILE,
                async move { api.get(endpoints::DRIVER_ME).await },
                |state, response: &DriverProfileResponse| {
                    state.profile = response.driver_profile.clone();
                    state.user = response.user.clone().map(|mut user| {
                        user.profile_photo = response
                            .driver_profile
                            .as_ref()
                            .and_then(|profile| profile.profile_photo.clone());
                        user
                    });
                    None
                },
            )
            .await
    }

    pub async fn upload_documents(
        &self,
        documents: DocumentUpload,
    ) -> Result<DriverProfileResponse, ClientError> {
        let form = match documents.into_multipart() {
            Ok(form) => form,
            Err(err) => {
                self.store.fail(err.display_message(UPLOAD_DOCUMENTS.fallback_error));
                return Err(err);
            }
        };

        let api = self.api.clone();
        self.store
            .run(
                UPLOAD_DOCUMENTS,
                async move { api.post_multipart(endpoints::DRIVER_UPLOAD_DOCS, form).await },
                |state, response: &DriverProfileResponse| {
                    state.profile = response.driver_profile.clone();
                    Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "Documents uploaded successfully".to_string()),
                    )
                },
            )
            .await
    }

    pub async fn update_profile(
        &self,
        update: DriverProfileUpdate,
    ) -> Result<DriverProfileResponse, ClientError> {
        let api = self.api.clone();
        let form = update.into_multipart();
        self.store
            .run(
                UPDATE_PROFILE,
                async move { api.put_multipart(endpoints::DRIVER_UPDATE, form).await },
                |state, response: &DriverProfileResponse| {
                    state.profile = response.driver_profile.clone();
                    Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "Profile updated successfully".to_string()),
                    )
                },
            )
            .await
    }

    pub fn clear_state(&self) {
        self.store.clear_state();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vehicle() -> VehicleDetails {
        VehicleDetails {
            car_make: "Toyota".to_string(),
            car_model: "Corolla".to_string(),
            car_year: "2016".to_string(),
            license_plate: "LAG-123-XY".to_string(),
            available_seats: 4,
            bio: "Calm driver".to_string(),
            experience: "5 years".to_string(),
            preferred_routes: " Lagos-Ibadan, ,Lagos-Abuja ,".to_string(),
        }
    }

    #[test]
    fn onboarding_splits_routes_into_repeated_fields() {
        let form = DriverOnboarding {
            vehicle: vehicle(),
            profile_photo: Some(FileUpload::new("me.jpg", vec![1])),
            driver_license_image: None,
        }
        .into_multipart();

        assert_eq!(
            form.text_values("preferredRoutes[]"),
            vec!["Lagos-Ibadan", "Lagos-Abuja"]
        );
        assert!(form.text_values("preferredRoutes").is_empty());
        assert_eq!(form.text_values("availableSeats"), vec!["4"]);
        assert!(form.has_file("profilePhoto"));
        assert!(!form.has_file("driverLicenseImage"));
    }

    #[test]
    fn profile_update_joins_routes_into_one_field() {
        let form = DriverProfileUpdate {
            vehicle: vehicle(),
            profile_photo: None,
            driver_license_image: Some(FileUpload::new("licence.png", vec![2])),
        }
        .into_multipart();

        assert_eq!(form.text_values("preferredRoutes"), vec!["Lagos-Ibadan,Lagos-Abuja"]);
        assert!(form.has_file("driverLicenseImage"));
    }

    #[test]
    fn update_form_prefills_from_profile() {
        let profile: DriverProfile = serde_json::from_value(json!({
            "carMake": "Honda",
            "carYear": 2018,
            "preferredRoutes": ["Abuja-Kaduna", "Abuja-Jos"],
            "status": "approved"
        }))
        .unwrap();

        let update = DriverProfileUpdate::from_profile(&profile);
        assert_eq!(update.vehicle.car_make, "Honda");
        assert_eq!(update.vehicle.car_year, "2018");
        assert_eq!(update.vehicle.preferred_routes, "Abuja-Kaduna, Abuja-Jos");
        assert_eq!(update.vehicle.available_seats, 0);
    }

    #[test]
    fn empty_document_upload_is_rejected_locally() {
        let result = DocumentUpload::default().into_multipart();
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }
}
