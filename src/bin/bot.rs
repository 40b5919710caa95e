use anyhow::Context as _;
use teloxide::prelude::*;
use wiralis::app::App;

async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    wiralis::logger::init().context("Logger should be built")?;

    tracing::info!(git_sha = env!("GIT_SHA"), "Starting Wiralis bot...");

    let app = App::init().await.context("App should be built")?;

    tokio::spawn(wiralis::utils::listen_for_ctrl_c());

    let handler = dptree::entry()
        .branch(
            Update::filter_message().endpoint(move |m: Message| async move {
                let result = wiralis::telegram::handle_message(app, m.clone()).await;

                if let Err(err) = &result {
                    tracing::error!(err = ?err, chat_id = %m.chat.id, "Error on message handling");

                    wiralis::telegram::report_error(app, &m).await?;
                }

                result.map(|_| ())
            }),
        )
        .branch(Update::filter_callback_query().endpoint(
            move |q: CallbackQuery| async move {
                let user_id = q.from.id;
                let result = wiralis::telegram::handlers::inline_buttons::handle(app, q).await;

                if let Err(err) = &result {
                    tracing::error!(err = ?err, %user_id, "Error on inline button handling");
                }

                result
            },
        ));

    let mut dispatcher = Dispatcher::builder(app.bot().clone(), handler).build();

    let token = dispatcher.shutdown_token();

    tokio::spawn(async move {
        wiralis::utils::ctrl_c().await;

        match token.shutdown() {
            Ok(done) => done.await,
            Err(err) => tracing::warn!(err = ?err, "Dispatcher is not running"),
        }
    });

    dispatcher.dispatch().await;

    Ok(())
}

#[tokio::main(worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    run().await
}
