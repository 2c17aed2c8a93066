use kashtanka_core::{
    CardService, CardStorage, ContactInfo, Identifier, ImageSource, MemoryStorage, PetCard,
    PetPhoto, PhotoService, PhotoStorage, ProcessedOutcome,
};
use std::sync::Arc;

fn id(raw: &str) -> Identifier {
    Identifier::new(raw).unwrap()
}

fn card_with_contacts() -> PetCard {
    PetCard {
        contact_info: Some(ContactInfo {
            name: Some("Ivan".to_string()),
            comment: Some("reward offered".to_string()),
            email: vec!["ivan@example.org".to_string()],
            tel: vec!["+70000000001".to_string()],
            website: vec!["https://example.org".to_string()],
        }),
        ..PetCard::default()
    }
}

#[tokio::test]
async fn card_contacts_are_redacted_unless_requested() {
    let storage = Arc::new(MemoryStorage::new());
    let service = CardService::new(Arc::clone(&storage));
    service
        .create_card(&id("ns"), &id("a"), &card_with_contacts())
        .await
        .unwrap();

    let public = service
        .get_card(&id("ns"), &id("a"), false)
        .await
        .unwrap()
        .unwrap();
    let contact = public.contact_info.unwrap();
    assert!(contact.name.is_none());
    assert!(contact.email.is_empty());
    assert!(contact.tel.is_empty());
    assert!(contact.website.is_empty());
    assert_eq!(contact.comment.as_deref(), Some("reward offered"));

    let full = service
        .get_card(&id("ns"), &id("a"), true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(full, card_with_contacts());

    let stored = storage.get_card(&id("ns"), &id("a")).await.unwrap().unwrap();
    assert_eq!(stored, card_with_contacts());
}

#[tokio::test]
async fn resolve_image_prefers_processings_in_order() {
    let storage = Arc::new(MemoryStorage::new());
    let service = PhotoService::new(Arc::clone(&storage));
    let added = storage
        .add_original_photo(&id("ns"), &id("a"), 1, &PetPhoto::new(vec![1_u8], "image/jpeg"))
        .await
        .unwrap();
    storage
        .add_processed_photo(added.uuid, &id("annotated"), &PetPhoto::new(vec![2_u8], "image/png"))
        .await
        .unwrap();

    let preferred = [id("crop"), id("annotated")];
    let resolved = service
        .resolve_image(&id("ns"), &id("a"), 1, &preferred)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.uuid, added.uuid);
    assert_eq!(resolved.source, ImageSource::Processed(id("annotated")));
    assert_eq!(resolved.image, Some(vec![2_u8]));
    assert_eq!(resolved.mime_type, "image/png");

    let original = service
        .resolve_image(&id("ns"), &id("a"), 1, &[id("crop")])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.source, ImageSource::Original);
    assert_eq!(original.image, Some(vec![1_u8]));

    assert!(service
        .resolve_image(&id("ns"), &id("a"), 2, &preferred)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn resolve_image_defaults_mime_type() {
    let storage = Arc::new(MemoryStorage::new());
    let service = PhotoService::new(Arc::clone(&storage));
    let bare = PetPhoto {
        image: Some(vec![5_u8]),
        mime_type: None,
    };
    storage
        .add_original_photo(&id("ns"), &id("a"), 1, &bare)
        .await
        .unwrap();

    let resolved = service
        .resolve_image(&id("ns"), &id("a"), 1, &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.mime_type, "image");
}

#[tokio::test]
async fn processed_photo_requires_original() {
    let storage = Arc::new(MemoryStorage::new());
    let service = PhotoService::new(Arc::clone(&storage));
    let crop = PetPhoto::new(vec![9_u8], "image/png");

    assert_eq!(
        service
            .add_processed_for_original(&id("ns"), &id("a"), 1, &id("crop"), &crop)
            .await
            .unwrap(),
        ProcessedOutcome::OriginalMissing
    );

    let added = storage
        .add_original_photo(&id("ns"), &id("a"), 1, &PetPhoto::new(vec![1_u8], "image"))
        .await
        .unwrap();
    assert_eq!(
        service
            .add_processed_for_original(&id("ns"), &id("a"), 1, &id("crop"), &crop)
            .await
            .unwrap(),
        ProcessedOutcome::Created(added.uuid)
    );
    assert_eq!(
        service
            .add_processed_for_original(&id("ns"), &id("a"), 1, &id("crop"), &crop)
            .await
            .unwrap(),
        ProcessedOutcome::Exists(added.uuid)
    );
}

#[tokio::test]
async fn features_are_attached_through_the_original_and_listed() {
    let storage = Arc::new(MemoryStorage::new());
    let service = PhotoService::new(Arc::clone(&storage));

    assert!(service
        .set_features_for_original(&id("ns"), &id("a"), 1, &id("embedding"), &[0.5])
        .await
        .unwrap()
        .is_none());

    let photo = PetPhoto::new(vec![1_u8], "image");
    let one = storage
        .add_original_photo(&id("ns"), &id("a"), 1, &photo)
        .await
        .unwrap();
    let two = storage
        .add_original_photo(&id("ns"), &id("a"), 2, &photo)
        .await
        .unwrap();

    assert_eq!(
        service
            .set_features_for_original(&id("ns"), &id("a"), 1, &id("embedding"), &[0.5, 0.25])
            .await
            .unwrap(),
        Some(one.uuid)
    );

    let listed = service
        .list_with_features(&id("ns"), &id("a"), &[id("embedding"), id("color")])
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].reference.uuid, one.uuid);
    assert_eq!(listed[0].features.len(), 1);
    assert_eq!(listed[0].features["embedding"], vec![0.5, 0.25]);
    assert_eq!(listed[1].reference.uuid, two.uuid);
    assert!(listed[1].features.is_empty());
}
