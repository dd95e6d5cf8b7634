use shared::Currency;
use soroban_sdk::{testutils::Address as _, Address, Env};

use crate::{Error, FeeSchedule, FeeScheduleClient};

fn setup_contract() -> (Env, FeeScheduleClient<'static>, Address) {
    let env = Env::default();
    env.mock_all_auths();

    let contract_id = env.register(FeeSchedule, ());
    let client = FeeScheduleClient::new(&env, &contract_id);

    let admin = Address::generate(&env);
    client.init(&admin);

    (env, client, admin)
}

#[test]
fn test_init_already_initialized() {
    let (_env, client, admin) = setup_contract();

    assert_eq!(client.try_init(&admin), Err(Ok(Error::AlreadyInitialized)));
}

#[test]
fn test_set_row_and_lookup() {
    let (_env, client, admin) = setup_contract();

    client.set_row(&admin, &Currency::Coins, &100i128, &5i128);
    client.set_row(&admin, &Currency::Cash, &100i128, &9i128);

    assert_eq!(client.lookup_fee(&Currency::Coins, &100i128), 5);
    assert_eq!(client.lookup_fee(&Currency::Cash, &100i128), 9);
}

#[test]
fn test_lookup_is_exact_match_only() {
    let (_env, client, admin) = setup_contract();

    client.set_row(&admin, &Currency::Coins, &100i128, &5i128);

    // A near-miss amount has no row; the error surfaces, never a zero fee.
    assert_eq!(
        client.try_lookup_fee(&Currency::Coins, &99i128),
        Err(Ok(Error::UnknownEntryTier))
    );
    assert_eq!(
        client.try_lookup_fee(&Currency::Cash, &100i128),
        Err(Ok(Error::UnknownEntryTier))
    );
}

#[test]
fn test_zero_fee_row_is_valid() {
    let (_env, client, admin) = setup_contract();

    client.set_row(&admin, &Currency::Coins, &50i128, &0i128);
    assert_eq!(client.lookup_fee(&Currency::Coins, &50i128), 0);
}

#[test]
fn test_set_row_rejects_bad_amounts() {
    let (_env, client, admin) = setup_contract();

    assert_eq!(
        client.try_set_row(&admin, &Currency::Coins, &0i128, &5i128),
        Err(Ok(Error::InvalidAmount))
    );
    assert_eq!(
        client.try_set_row(&admin, &Currency::Coins, &100i128, &-1i128),
        Err(Ok(Error::InvalidAmount))
    );
}

#[test]
fn test_set_row_unauthorized() {
    let (env, client, _) = setup_contract();

    let outsider = Address::generate(&env);
    assert_eq!(
        client.try_set_row(&outsider, &Currency::Coins, &100i128, &5i128),
        Err(Ok(Error::NotAuthorized))
    );
}

#[test]
fn test_remove_row() {
    let (_env, client, admin) = setup_contract();

    client.set_row(&admin, &Currency::Coins, &100i128, &5i128);
    client.remove_row(&admin, &Currency::Coins, &100i128);

    assert_eq!(
        client.try_lookup_fee(&Currency::Coins, &100i128),
        Err(Ok(Error::UnknownEntryTier))
    );
    assert_eq!(
        client.try_remove_row(&admin, &Currency::Coins, &100i128),
        Err(Ok(Error::UnknownEntryTier))
    );
}

#[test]
fn test_version_bumps_on_every_edit() {
    let (_env, client, admin) = setup_contract();

    assert_eq!(client.version(), 0);
    client.set_row(&admin, &Currency::Coins, &100i128, &5i128);
    assert_eq!(client.version(), 1);
    client.set_row(&admin, &Currency::Coins, &100i128, &7i128);
    assert_eq!(client.version(), 2);
    client.remove_row(&admin, &Currency::Coins, &100i128);
    assert_eq!(client.version(), 3);
}
