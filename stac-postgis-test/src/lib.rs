use proc_macro::TokenStream;
use quote::quote;
use syn::ItemFn;

/// Runs an async test against a migrated PostGIS database inside a
/// transaction that is rolled back afterwards.
///
/// The test function takes a `&Client<Transaction<'_>>`, and the calling
/// module must provide a `POOL` of connections. These tests are ignored by
/// default; run them with `cargo test -- --ignored`.
#[proc_macro_attribute]
pub fn postgis_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();
    impl_postgis_test(ast)
}

fn impl_postgis_test(ast: ItemFn) -> TokenStream {
    let ident = &ast.sig.ident;
    let gen = quote! {
        #[tokio::test]
        #[ignore = "requires a PostGIS database, see STAC_POSTGIS_TEST_DB"]
        async fn #ident() {
            let mut client = POOL.get().await.get().await.unwrap();
            let transaction = client.transaction().await.unwrap();
            let client = Client::new(transaction);
            client.migrate().await.unwrap();
            #ast
            #ident(&client).await;
            client.into_inner().rollback().await.unwrap();
        }
    };
    gen.into()
}
