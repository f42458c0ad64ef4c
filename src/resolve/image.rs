//! Machine image catalog.
//!
//! Maps the symbolic image names accepted in configuration files to the
//! platform AMIs, and back.

use std::collections::BTreeMap;

use crate::config::{CustomImage, ImageSpec, DEFAULT_REGION, LEGACY_REGION};
use crate::error::{ImageError, Result};
use crate::platform::Resource;

/// A catalog image.
#[derive(Debug, Clone, Copy)]
struct CatalogEntry {
    name: &'static str,
    user: &'static str,
    amis: &'static [(&'static str, &'static str)],
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "debian-8.7",
        user: "admin",
        amis: &[
            (DEFAULT_REGION, "ami-061026464372bc7bf"),
            (LEGACY_REGION, "ami-5900cc36"),
        ],
    },
    CatalogEntry {
        name: "debian-11",
        user: "admin",
        amis: &[(DEFAULT_REGION, "ami-010716a347cc5be84")],
    },
    CatalogEntry {
        name: "fedora-26",
        user: "fedora",
        amis: &[(LEGACY_REGION, "ami-5364c43c")],
    },
    CatalogEntry {
        name: "ubuntu-14.04.5",
        user: "ubuntu",
        amis: &[(LEGACY_REGION, "ami-e6de6a89")],
    },
    CatalogEntry {
        name: "ubuntu-16.04.2",
        user: "ubuntu",
        amis: &[
            (DEFAULT_REGION, "ami-064be016683d0de06"),
            (LEGACY_REGION, "ami-1e339e71"),
        ],
    },
    CatalogEntry {
        name: "ubuntu-20.04",
        user: "ubuntu",
        amis: &[
            (DEFAULT_REGION, "ami-0754c1bf35f85d01f"),
            (LEGACY_REGION, "ami-0feb4583c4b758dea"),
            ("eu-west-3", "ami-077e7b9090435f0bd"),
        ],
    },
    CatalogEntry {
        name: "amazon-linux-2017.09.1",
        user: "ec2-user",
        amis: &[(LEGACY_REGION, "ami-ac442ac3")],
    },
    CatalogEntry {
        name: "amazon-linux-v2-2017.09.1",
        user: "ec2-user",
        amis: &[(LEGACY_REGION, "ami-1b2bb774")],
    },
    CatalogEntry {
        name: "amazon-linux-v2.0.20221210.1",
        user: "ec2-user",
        amis: &[(DEFAULT_REGION, "ami-0455da2bdc38b251e")],
    },
    CatalogEntry {
        name: "centos-7",
        user: "centos",
        amis: &[(LEGACY_REGION, "ami-337be65c")],
    },
    CatalogEntry {
        name: "centos-7.9",
        user: "centos",
        amis: &[
            (DEFAULT_REGION, "ami-06d5af736376c3798"),
            (LEGACY_REGION, "ami-08b6d44b4f6f7b279"),
        ],
    },
    CatalogEntry {
        name: "docker-17.09.0-ce",
        user: "ubuntu",
        amis: &[
            (DEFAULT_REGION, "ami-0d601c1d4166c5e45"),
            (LEGACY_REGION, "ami-614dcd0e"),
        ],
    },
    CatalogEntry {
        name: "windows-server-2016",
        user: "Administrator",
        amis: &[
            (DEFAULT_REGION, "ami-0afcd9cce919e7a9c"),
            (LEGACY_REGION, "ami-0ea21e760f354e854"),
        ],
    },
    CatalogEntry {
        name: "windows-server-2019",
        user: "Administrator",
        amis: &[
            (DEFAULT_REGION, "ami-090d5efe85c2be3d1"),
            (LEGACY_REGION, "ami-055a56647b41498c3"),
        ],
    },
];

impl CatalogEntry {
    fn ami(&self, region: &str) -> Option<&'static str> {
        self.amis
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, ami)| *ami)
    }

    /// `eu-west-1` when the image exists there, the legacy region otherwise.
    fn default_region(&self) -> &'static str {
        if self.ami(DEFAULT_REGION).is_some() {
            DEFAULT_REGION
        } else {
            LEGACY_REGION
        }
    }

    fn default_ami(&self) -> Option<&'static str> {
        self.ami(self.default_region())
    }
}

/// A fully resolved machine image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// AMI in the active region.
    pub id: String,
    /// User to log in with.
    pub user: String,
    /// Active region.
    pub region: String,
    /// AMI per region, including the active one.
    pub region_mapping: BTreeMap<String, String>,
    /// Whether the image runs Windows.
    pub is_windows: bool,
    /// Whether the image is outside the catalog.
    pub is_custom: bool,
}

/// Static catalog of the platform images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCatalog;

impl ImageCatalog {
    /// Returns every catalog name, in catalog order.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        CATALOG.iter().map(|entry| entry.name).collect()
    }

    /// Returns whether a name is part of the catalog.
    #[must_use]
    pub fn contains(name: &str) -> bool {
        CATALOG.iter().any(|entry| entry.name == name)
    }

    /// Builds the error reported for a name missing from the catalog.
    #[must_use]
    pub fn unknown(name: &str) -> ImageError {
        ImageError::UnknownImage {
            name: name.to_string(),
            available: Self::names().into_iter().map(String::from).collect(),
        }
    }

    /// Resolves an image specification.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::UnknownImage`] if a symbolic name is not in the
    /// catalog.
    pub fn resolve(spec: &ImageSpec) -> Result<ResolvedImage> {
        match spec {
            ImageSpec::Named(name) => Self::resolve_named(name),
            ImageSpec::Custom(image) => Ok(Self::resolve_custom(image)),
        }
    }

    fn resolve_named(name: &str) -> Result<ResolvedImage> {
        let entry = CATALOG
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| Self::unknown(name))?;

        let region = entry.default_region();
        let region_mapping: BTreeMap<String, String> = entry
            .amis
            .iter()
            .map(|(r, ami)| ((*r).to_string(), (*ami).to_string()))
            .collect();

        Ok(ResolvedImage {
            id: entry.default_ami().unwrap_or_default().to_string(),
            user: entry.user.to_string(),
            region: region.to_string(),
            region_mapping,
            is_windows: entry.name.starts_with("windows"),
            is_custom: false,
        })
    }

    fn resolve_custom(image: &CustomImage) -> ResolvedImage {
        let mut region_mapping = image.region_mapping.clone();
        region_mapping.insert(image.ec2_region.clone(), image.image_id.clone());

        ResolvedImage {
            id: image.image_id.clone(),
            user: image.image_user.clone(),
            region: image.ec2_region.clone(),
            region_mapping,
            is_windows: image.is_windows,
            is_custom: true,
        }
    }

    /// Reconstructs an image specification from a remote resource.
    ///
    /// Catalog images are recognized by their default-region AMI; anything
    /// else becomes an explicit image keeping the remote region mapping.
    #[must_use]
    pub fn from_remote(resource: &Resource) -> ImageSpec {
        if !resource.is_custom_image {
            if let Some(entry) = CATALOG
                .iter()
                .find(|entry| entry.default_ami() == Some(resource.image_id.as_str()))
            {
                return ImageSpec::Named(entry.name.to_string());
            }
        }

        let region = resource
            .ec2_region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut region_mapping = resource.region_mapping();
        if region_mapping.get(&region) == Some(&resource.image_id) {
            region_mapping.remove(&region);
        }

        ImageSpec::Custom(CustomImage {
            image_id: resource.image_id.clone(),
            image_user: resource.image_user.clone(),
            ec2_region: region,
            region_mapping,
            is_windows: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(image_id: &str, region: &str, custom: bool) -> Resource {
        serde_json::from_value(serde_json::json!({
            "id": "r1",
            "name": "lab",
            "image_id": image_id,
            "image_user": "ubuntu",
            "ec2_region": region,
            "is_custom_image": custom
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_named_prefers_default_region() {
        let image = ImageCatalog::resolve(&ImageSpec::Named(String::from("ubuntu-20.04"))).unwrap();
        assert_eq!(image.id, "ami-0754c1bf35f85d01f");
        assert_eq!(image.region, DEFAULT_REGION);
        assert_eq!(image.user, "ubuntu");
        assert_eq!(image.region_mapping.len(), 3);
        assert!(!image.is_windows);
        assert!(!image.is_custom);
    }

    #[test]
    fn test_resolve_named_legacy_region() {
        let image = ImageCatalog::resolve(&ImageSpec::Named(String::from("fedora-26"))).unwrap();
        assert_eq!(image.region, LEGACY_REGION);
        assert_eq!(image.id, "ami-5364c43c");
    }

    #[test]
    fn test_resolve_windows() {
        let image =
            ImageCatalog::resolve(&ImageSpec::Named(String::from("windows-server-2019"))).unwrap();
        assert!(image.is_windows);
        assert_eq!(image.user, "Administrator");
    }

    #[test]
    fn test_resolve_unknown_name() {
        let err = ImageCatalog::resolve(&ImageSpec::Named(String::from("plan9"))).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("plan9"));
        assert!(message.contains("debian-11"));
    }

    #[test]
    fn test_resolve_custom_inserts_active_region() {
        let spec = ImageSpec::Custom(CustomImage {
            image_id: String::from("ami-new"),
            image_user: String::from("root"),
            ec2_region: String::from("eu-west-3"),
            region_mapping: BTreeMap::from([
                (String::from("eu-west-3"), String::from("ami-old")),
                (String::from("us-east-1"), String::from("ami-us")),
            ]),
            is_windows: false,
        });
        let image = ImageCatalog::resolve(&spec).unwrap();
        assert!(image.is_custom);
        assert_eq!(image.region_mapping["eu-west-3"], "ami-new");
        assert_eq!(image.region_mapping["us-east-1"], "ami-us");
    }

    #[test]
    fn test_from_remote_round_trip() {
        for name in ImageCatalog::names() {
            let resolved = ImageCatalog::resolve(&ImageSpec::Named(name.to_string())).unwrap();
            let resource = remote(&resolved.id, &resolved.region, false);
            assert_eq!(
                ImageCatalog::from_remote(&resource),
                ImageSpec::Named(name.to_string())
            );
        }
    }

    #[test]
    fn test_from_remote_custom_flag_wins() {
        let resource = remote("ami-0754c1bf35f85d01f", DEFAULT_REGION, true);
        let ImageSpec::Custom(image) = ImageCatalog::from_remote(&resource) else {
            panic!("expected a custom image");
        };
        assert_eq!(image.image_id, "ami-0754c1bf35f85d01f");
        assert!(image.region_mapping.is_empty());
    }

    #[test]
    fn test_from_remote_keeps_mapping() {
        let mut resource = remote("ami-x", "eu-west-3", false);
        resource.image_region_mapping = Some(BTreeMap::from([
            (String::from("eu-west-3"), String::from("ami-x")),
            (String::from("us-east-1"), String::from("ami-y")),
        ]));
        let spec = ImageCatalog::from_remote(&resource);
        let resolved = ImageCatalog::resolve(&spec).unwrap();
        assert_eq!(Some(resolved.region_mapping), resource.image_region_mapping);
    }
}
