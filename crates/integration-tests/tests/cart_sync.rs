//! Cart and wishlist mirroring between the session cart and remote storage.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use kramnytsia_core::{Cart, ProductId, UserId};
use kramnytsia_integration_tests::{MemoryCartRemote, fast_retry, product};
use kramnytsia_storefront::services::{CartRemote, CartStore};

fn store(remote: &Arc<MemoryCartRemote>) -> CartStore {
    CartStore::new(Arc::clone(remote) as Arc<dyn CartRemote>, fast_retry())
}

#[tokio::test]
async fn test_signed_in_mutations_reach_remote() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user = Some(UserId::new(7));
    let mut cart = Cart::new();

    carts.add_to_cart(&mut cart, user, &product(1, 10, 5), 2).await.unwrap();
    carts.add_to_cart(&mut cart, user, &product(2, 5, 1), 1).await.unwrap();
    carts.increase_quantity(&mut cart, user, ProductId::new(1)).await.unwrap();
    assert!(carts.add_to_wishlist(&mut cart, user, ProductId::new(3)).await);
    carts.flush().await;

    assert_eq!(remote.cart(UserId::new(7)).await, cart);
    assert_eq!(remote.applied(), 4);
    assert!(!carts.sync_status(UserId::new(7)).await.degraded);
}

#[tokio::test]
async fn test_anonymous_cart_stays_local() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let mut cart = Cart::new();

    carts.add_to_cart(&mut cart, None, &product(1, 10, 5), 1).await.unwrap();
    carts.clear_cart(&mut cart, None).await;
    carts.flush().await;

    assert_eq!(remote.applied(), 0);
    assert_eq!(remote.replaced(), 0);
}

#[tokio::test]
async fn test_rejected_mutation_is_not_mirrored() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user = Some(UserId::new(1));
    let mut cart = Cart::new();

    carts.add_to_cart(&mut cart, user, &product(1, 10, 2), 2).await.unwrap();
    assert!(carts.increase_quantity(&mut cart, user, ProductId::new(1)).await.is_err());
    assert!(carts.add_to_wishlist(&mut cart, user, ProductId::new(9)).await);
    assert!(!carts.add_to_wishlist(&mut cart, user, ProductId::new(9)).await);
    carts.flush().await;

    assert_eq!(remote.applied(), 2);
    assert_eq!(cart.items()[0].quantity, 2);
}

#[tokio::test]
async fn test_failed_sync_degrades_then_snapshot_repairs() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user_id = UserId::new(3);
    let mut cart = Cart::new();

    remote.set_failing(true);
    carts.add_to_cart(&mut cart, Some(user_id), &product(1, 10, 5), 1).await.unwrap();
    carts.flush().await;

    let status = carts.sync_status(user_id).await;
    assert!(status.degraded);
    assert!(status.last_error.is_some());
    assert!(status.failed_at.is_some());
    // The session cart is unaffected by the remote outage.
    assert_eq!(cart.items().len(), 1);

    remote.set_failing(false);
    carts.add_to_cart(&mut cart, Some(user_id), &product(2, 4, 5), 1).await.unwrap();
    carts.flush().await;

    assert_eq!(remote.replaced(), 1);
    assert_eq!(remote.applied(), 0);
    assert_eq!(remote.cart(user_id).await, cart);
    assert!(!carts.sync_status(user_id).await.degraded);
}

#[tokio::test]
async fn test_manual_resync_clears_degraded_state() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user_id = UserId::new(4);
    let mut cart = Cart::new();

    remote.set_failing(true);
    carts.add_to_cart(&mut cart, Some(user_id), &product(1, 10, 5), 3).await.unwrap();
    carts.flush().await;
    assert!(carts.sync_status(user_id).await.degraded);

    remote.set_failing(false);
    carts.resync(&mut cart, user_id).await;
    carts.flush().await;

    assert!(!carts.sync_status(user_id).await.degraded);
    assert_eq!(remote.cart(user_id).await.items()[0].quantity, 3);
}

#[tokio::test]
async fn test_sign_in_adopts_remote_and_uploads_local_only_entries() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user_id = UserId::new(5);

    let mut saved = Cart::new();
    saved.add_to_cart(&product(1, 10, 5), 2).unwrap();
    remote.put(user_id, saved).await;

    let mut cart = Cart::new();
    carts.add_to_cart(&mut cart, None, &product(1, 10, 5), 1).await.unwrap();
    carts.add_to_cart(&mut cart, None, &product(2, 7, 5), 1).await.unwrap();
    carts.add_to_wishlist(&mut cart, None, ProductId::new(8)).await;

    let outcome = carts.sign_in(&mut cart, user_id).await;
    carts.flush().await;

    assert_eq!(outcome.superseded, 1);
    assert_eq!(outcome.uploads.len(), 2);
    assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 2);
    assert!(cart.get(ProductId::new(2)).is_some());

    let stored = remote.cart(user_id).await;
    assert_eq!(stored.items().len(), 2);
    assert_eq!(stored.wishlist(), &[ProductId::new(8)]);
}

#[tokio::test]
async fn test_sign_in_keeps_local_cart_when_remote_unreadable() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user_id = UserId::new(6);

    let mut cart = Cart::new();
    carts.add_to_cart(&mut cart, None, &product(1, 10, 5), 2).await.unwrap();
    let before = cart.clone();

    remote.set_failing(true);
    let outcome = carts.sign_in(&mut cart, user_id).await;
    carts.flush().await;

    assert_eq!(cart, before);
    assert!(outcome.uploads.is_empty());
    let status = carts.sync_status(user_id).await;
    assert!(status.degraded);
    assert!(status.remote_pending);
}

#[tokio::test]
async fn test_unread_remote_is_merged_before_any_write() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user_id = UserId::new(10);

    let mut saved = Cart::new();
    saved.add_to_cart(&product(1, 10, 5), 2).unwrap();
    saved.add_to_wishlist(ProductId::new(7));
    remote.put(user_id, saved).await;

    let mut cart = Cart::new();
    carts.add_to_cart(&mut cart, None, &product(2, 4, 5), 1).await.unwrap();

    remote.set_failing(true);
    carts.sign_in(&mut cart, user_id).await;
    // Still unreadable: the change stays local.
    carts.increase_quantity(&mut cart, Some(user_id), ProductId::new(2)).await.unwrap();
    carts.flush().await;
    assert_eq!(remote.applied(), 0);
    assert_eq!(remote.replaced(), 0);

    remote.set_failing(false);
    carts.increase_quantity(&mut cart, Some(user_id), ProductId::new(2)).await.unwrap();
    carts.flush().await;

    assert_eq!(remote.replaced(), 0);
    let stored = remote.cart(user_id).await;
    assert_eq!(stored.get(ProductId::new(1)).unwrap().quantity, 2);
    assert_eq!(stored.get(ProductId::new(2)).unwrap().quantity, 3);
    assert_eq!(stored.wishlist(), &[ProductId::new(7)]);
    assert_eq!(cart, stored);

    let status = carts.sync_status(user_id).await;
    assert!(!status.degraded);
    assert!(!status.remote_pending);
}

#[tokio::test]
async fn test_sign_out_merges_pending_remote_instead_of_overwriting() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user_id = UserId::new(11);

    let mut saved = Cart::new();
    saved.add_to_cart(&product(1, 10, 5), 1).unwrap();
    remote.put(user_id, saved).await;

    let mut cart = Cart::new();
    carts.add_to_cart(&mut cart, None, &product(2, 4, 5), 1).await.unwrap();
    remote.set_failing(true);
    carts.sign_in(&mut cart, user_id).await;

    remote.set_failing(false);
    carts.sign_out(&mut cart, user_id).await;
    carts.flush().await;

    assert!(cart.is_empty());
    assert_eq!(remote.replaced(), 0);
    let stored = remote.cart(user_id).await;
    assert!(stored.get(ProductId::new(1)).is_some());
    assert!(stored.get(ProductId::new(2)).is_some());
}

#[tokio::test]
async fn test_sign_out_pushes_unsynced_state_and_detaches() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user_id = UserId::new(9);
    let mut cart = Cart::new();

    remote.set_failing(true);
    carts.add_to_cart(&mut cart, Some(user_id), &product(1, 10, 5), 1).await.unwrap();
    carts.flush().await;
    let unsynced = cart.clone();

    remote.set_failing(false);
    carts.sign_out(&mut cart, user_id).await;
    carts.flush().await;

    assert!(cart.is_empty());
    assert_eq!(remote.cart(user_id).await, unsynced);
}

#[tokio::test]
async fn test_move_to_cart_mirrors_both_changes() {
    let remote = MemoryCartRemote::new();
    let carts = store(&remote);
    let user = Some(UserId::new(2));
    let mut cart = Cart::new();

    carts.add_to_wishlist(&mut cart, user, ProductId::new(4)).await;
    carts.move_to_cart(&mut cart, user, &product(4, 12, 3)).await.unwrap();
    carts.flush().await;

    let stored = remote.cart(UserId::new(2)).await;
    assert!(stored.wishlist().is_empty());
    assert_eq!(stored.get(ProductId::new(4)).unwrap().quantity, 1);
}
