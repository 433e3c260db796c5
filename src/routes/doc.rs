use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        disputes::{DisputeDetails, DisputeList, ResolveDisputeRequest, UpdateDisputeStatusRequest},
        orders::{
            AdminReleaseRequest, CancelOrderRequest, OpenDisputeRequest, OrderList,
            PayOrderRequest, PlaceOrderRequest, ShipOrderRequest,
        },
    },
    escrow::EscrowPosition,
    middleware::auth::{Role, USER_ID_HEADER, USER_ROLE_HEADER},
    models::{
        Dispute, DisputeOutcome, DisputeResolution, DisputeStatus, Listing, ListingStatus, Order,
        OrderAggregate, OrderItem, OrderStatus, Payment, PaymentMethod, PaymentStatus,
        StatusHistoryEntry,
    },
    response::{ApiResponse, Meta},
    routes::{admin, disputes, health, orders, params},
    services::escrow_service::EscrowOverview,
    sweeper::SweepReport,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "user_id",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                USER_ID_HEADER,
                "Caller id forwarded by the gateway",
            ))),
        );
        components.add_security_scheme(
            "user_role",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                USER_ROLE_HEADER,
                "`user` or `admin`",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        orders::pay_order,
        orders::start_processing,
        orders::ship_order,
        orders::confirm_delivery,
        orders::cancel_order,
        orders::release_funds,
        orders::open_dispute,
        disputes::get_dispute,
        admin::release_funds_admin,
        admin::escrow_overview,
        admin::run_auto_release,
        admin::list_disputes,
        admin::resolve_dispute,
        admin::update_dispute_status
    ),
    components(
        schemas(
            Order,
            OrderItem,
            Payment,
            StatusHistoryEntry,
            Dispute,
            DisputeResolution,
            Listing,
            OrderAggregate,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            DisputeStatus,
            DisputeOutcome,
            ListingStatus,
            Role,
            PlaceOrderRequest,
            PayOrderRequest,
            ShipOrderRequest,
            CancelOrderRequest,
            OpenDisputeRequest,
            AdminReleaseRequest,
            ResolveDisputeRequest,
            UpdateDisputeStatusRequest,
            OrderList,
            DisputeList,
            DisputeDetails,
            EscrowPosition,
            EscrowOverview,
            SweepReport,
            params::Pagination,
            params::SortOrder,
            params::OrderListQuery,
            params::DisputeScope,
            params::DisputeListQuery,
            Meta,
            ApiResponse<OrderAggregate>,
            ApiResponse<OrderList>,
            ApiResponse<DisputeList>,
            ApiResponse<DisputeDetails>,
            ApiResponse<EscrowOverview>,
            ApiResponse<SweepReport>
        )
    ),
    security(
        ("user_id" = []),
        ("user_role" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Disputes", description = "Dispute endpoints for buyers and sellers"),
        (name = "Admin", description = "Escrow and dispute administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
